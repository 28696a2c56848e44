//! Random sampling without replacement over `{0..k-1}`.
//!
//! Both samplers emit a permutation lazily: `reset(k)` costs O(1) when the
//! buffer already holds a permutation of the same length, and each `next()`
//! is one step of an in-place Fisher–Yates shuffle over the not-yet-emitted
//! prefix of the buffer.  Emitting the whole sequence is O(k) with no
//! allocation after the first reset.
//!
//! ```text
//!  buffer: [ not yet emitted ........ | emitted (reverse order) ]
//!            0                pointer-1  pointer               len
//! ```

use crate::{PsError, PsResult, SimRng};

// ── RandPermutation ───────────────────────────────────────────────────────────

/// Uniform random permutation of `0..k`, consumable one element at a time.
#[derive(Debug, Clone, Default)]
pub struct RandPermutation {
    buffer:  Vec<usize>,
    len:     usize,
    /// Count of not-yet-emitted elements.  Always `<= len`.
    pointer: usize,
}

impl RandPermutation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh permutation of `0..k`.
    ///
    /// The buffer is reused as-is when the previous permutation had the same
    /// length: any permutation is a valid starting point for the lazy shuffle.
    pub fn reset(&mut self, k: usize) {
        self.pointer = k;
        if self.len == k && self.buffer.len() == k {
            return;
        }
        self.buffer.clear();
        self.buffer.extend(0..k);
        self.len = k;
    }

    /// Shuffle all of `0..k` eagerly so it can be read with [`get`](Self::get).
    ///
    /// Leaves nothing for [`next`](Self::next) to emit.
    pub fn set_permutation(&mut self, k: usize, rng: &mut SimRng) {
        self.reset(k);
        for i in (2..=self.len).rev() {
            let j = rng.index(i);
            self.buffer.swap(j, i - 1);
        }
        self.pointer = 0;
    }

    /// The `i`-th element of the permutation built by `set_permutation`.
    pub fn get(&self, i: usize) -> Option<usize> {
        if i < self.len { Some(self.buffer[i]) } else { None }
    }

    /// Emit the next element.
    ///
    /// Fails with [`PsError::IterationExhausted`] once all `k` elements have
    /// been emitted.
    pub fn next(&mut self, rng: &mut SimRng) -> PsResult<usize> {
        if self.pointer == 0 {
            return Err(PsError::IterationExhausted);
        }
        let j = rng.index(self.pointer);
        self.buffer.swap(j, self.pointer - 1);
        self.pointer -= 1;
        Ok(self.buffer[self.pointer])
    }

    #[inline]
    pub fn has_next(&self) -> bool {
        self.pointer > 0
    }

    /// Elements still to be emitted.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.pointer
    }

    /// Length of the current permutation.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over the remaining elements, drawing from `rng` as it goes.
    pub fn drain<'a>(&'a mut self, rng: &'a mut SimRng) -> impl Iterator<Item = usize> + 'a {
        std::iter::from_fn(move || self.next(rng).ok())
    }
}

// ── WeightedRandPermutation ──────────────────────────────────────────────────

/// Random permutation of `0..k` where each draw picks among the remaining
/// elements with probability proportional to their weight.
#[derive(Debug, Clone, Default)]
pub struct WeightedRandPermutation {
    buffer:  Vec<usize>,
    /// `weights[i]` is the weight of `buffer[i]`; swapped in lockstep.
    weights: Vec<f64>,
    len:     usize,
    pointer: usize,
    /// Sum of the weights of the not-yet-emitted elements.
    sum:     f64,
}

impl WeightedRandPermutation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh weighted permutation of `0..k`.
    ///
    /// With `Some(w)` the first `k` entries of `w` become the weights; all of
    /// them must be strictly positive and finite.  With `None` the weights of
    /// the previous reset are reused, which requires that reset to have had
    /// the same `k`.
    pub fn reset(&mut self, k: usize, weights: Option<&[f64]>) -> PsResult<()> {
        match weights {
            Some(w) => {
                if w.len() < k {
                    return Err(PsError::illegal(
                        "weights",
                        format!("array too short: {} weights for {k} elements", w.len()),
                    ));
                }
                if let Some(bad) = w[..k].iter().find(|x| !(**x > 0.0 && x.is_finite())) {
                    return Err(PsError::illegal(
                        "weights",
                        format!("weights must be positive, got {bad}"),
                    ));
                }
                self.weights.clear();
                self.weights.extend_from_slice(&w[..k]);
                self.buffer.clear();
                self.buffer.extend(0..k);
                self.len = k;
            }
            None => {
                if self.len != k || self.weights.len() != k {
                    return Err(PsError::illegal(
                        "weights",
                        format!("no weights from a previous reset of length {k}"),
                    ));
                }
            }
        }
        self.sum = self.weights.iter().sum();
        self.pointer = k;
        Ok(())
    }

    /// Emit the next element, weight-biased among those remaining.
    pub fn next(&mut self, rng: &mut SimRng) -> PsResult<usize> {
        if self.pointer == 0 {
            return Err(PsError::IterationExhausted);
        }
        let d = self.sum * rng.random::<f64>();

        // Linear scan from the end of the active region.
        let mut i = self.pointer;
        let mut acc = self.weights[i - 1];
        while acc < d && i > 1 {
            i -= 1;
            acc += self.weights[i - 1];
        }

        let last = self.pointer - 1;
        self.buffer.swap(i - 1, last);
        self.weights.swap(i - 1, last);
        self.sum -= self.weights[last];
        self.pointer = last;
        Ok(self.buffer[last])
    }

    #[inline]
    pub fn has_next(&self) -> bool {
        self.pointer > 0
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.pointer
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
