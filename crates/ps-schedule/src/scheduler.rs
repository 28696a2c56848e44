//! `Scheduler` — when a component is allowed to run.
//!
//! Every protocol slot and every control carries one.  The dispatch loops ask
//! `active(t)` once per component per time point and skip the component when
//! it answers `false`.
//!
//! # Configuration keys
//!
//! Read under the component's prefix (`protocol.avg.step`, …):
//!
//! | Key        | Default   | Meaning                                          |
//! |------------|-----------|--------------------------------------------------|
//! | `step`     | 1         | period between activations                       |
//! | `at`       | disabled  | single activation; overrides the three above     |
//! | `from`     | 0         | first activation                                 |
//! | `until`    | unbounded | exclusive upper bound                            |
//! | `FINAL`    | off       | presence flag: also run at `TimePoint::Final`    |
//! | `precycle` | off       | presence flag: run before the protocols in a round |

use ps_core::params::key;
use ps_core::{Params, PsError, PsResult, Time};

pub const PAR_STEP: &str = "step";
pub const PAR_AT: &str = "at";
pub const PAR_FROM: &str = "from";
pub const PAR_UNTIL: &str = "until";
pub const PAR_FINAL: &str = "FINAL";
pub const PAR_PRECYCLE: &str = "precycle";

/// A point at which schedulers are consulted.
///
/// `Final` is the synthetic point after the last round; it is disjoint from
/// every `At(t)` and only [`Scheduler::fin`] answers for it.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimePoint {
    At(Time),
    Final,
}

/// Immutable time-activation predicate.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scheduler {
    from:     Time,
    until:    Time,
    step:     u64,
    fin:      bool,
    precycle: bool,
}

impl Default for Scheduler {
    /// Active at every time point from 0 on.
    fn default() -> Self {
        Self { from: Time::ZERO, until: Time::MAX, step: 1, fin: false, precycle: false }
    }
}

impl Scheduler {
    /// Periodic scheduler over `[from, until)`.
    pub fn new(from: Time, until: Time, step: u64) -> PsResult<Self> {
        if step < 1 {
            return Err(PsError::illegal(PAR_STEP, format!("step must be at least 1, got {step}")));
        }
        if from >= until {
            return Err(PsError::illegal(
                PAR_UNTIL,
                format!("from ({from}) must be before until ({until})"),
            ));
        }
        Ok(Self { from, until, step, fin: false, precycle: false })
    }

    /// Scheduler that fires exactly once, at `t`.
    pub fn at(t: Time) -> Self {
        Self { from: t, until: t.offset(1), step: 1, fin: false, precycle: false }
    }

    /// Active at `0, step, 2·step, …`.
    pub fn every(step: u64) -> PsResult<Self> {
        Self::new(Time::ZERO, Time::MAX, step)
    }

    pub fn with_final(mut self) -> Self {
        self.fin = true;
        self
    }

    pub fn with_precycle(mut self) -> Self {
        self.precycle = true;
        self
    }

    /// Read the scheduler of the component configured under `prefix`,
    /// defaulting `step` to 1.
    pub fn from_params(params: &Params, prefix: &str) -> PsResult<Self> {
        Self::read(params, prefix, Some(1))
    }

    /// Like [`from_params`](Self::from_params) but `step` must be given.
    pub fn from_params_strict(params: &Params, prefix: &str) -> PsResult<Self> {
        Self::read(params, prefix, None)
    }

    fn read(params: &Params, prefix: &str, default_step: Option<i64>) -> PsResult<Self> {
        let fin = params.contains(&key(prefix, PAR_FINAL));
        let precycle = params.contains(&key(prefix, PAR_PRECYCLE));

        let at_key = key(prefix, PAR_AT);
        let at = params.get_i64_or(&at_key, -1)?;
        let mut sched = if at >= 0 {
            Self::at(Time(at as u64))
        } else {
            let step_key = key(prefix, PAR_STEP);
            let step = match default_step {
                Some(d) => params.get_i64_or(&step_key, d)?,
                None => params.get_i64(&step_key)?,
            };
            if step < 1 {
                return Err(PsError::illegal(step_key, format!("step must be at least 1, got {step}")));
            }
            let from = non_negative(params, &key(prefix, PAR_FROM), 0)?;
            let until_key = key(prefix, PAR_UNTIL);
            let until = if params.contains(&until_key) {
                Time(non_negative(params, &until_key, 0)?)
            } else {
                Time::MAX
            };
            Self::new(Time(from), until, step as u64)?
        };
        sched.fin = fin;
        sched.precycle = precycle;
        Ok(sched)
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// `true` iff `from ≤ t < until` and `t` lies on the step grid.
    #[inline]
    pub fn active(&self, t: Time) -> bool {
        t >= self.from && t < self.until && (t.0 - self.from.0) % self.step == 0
    }

    #[inline]
    pub fn active_at(&self, point: TimePoint) -> bool {
        match point {
            TimePoint::At(t) => self.active(t),
            TimePoint::Final => self.fin,
        }
    }

    /// Whether the component also runs at `TimePoint::Final`.
    #[inline]
    pub fn fin(&self) -> bool {
        self.fin
    }

    /// Cycle mode only: run before the protocols rather than after them.
    #[inline]
    pub fn precycle(&self) -> bool {
        self.precycle
    }

    /// First activation point.
    pub fn start(&self) -> Time {
        self.from
    }

    pub fn until(&self) -> Time {
        self.until
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// A fresh cursor over `from, from + step, …`.
    pub fn cursor(&self) -> ScheduleCursor {
        ScheduleCursor { next: self.from, step: self.step }
    }
}

fn non_negative(params: &Params, name: &str, default: i64) -> PsResult<u64> {
    let v = params.get_i64_or(name, default)?;
    u64::try_from(v).map_err(|_| PsError::illegal(name, format!("must not be negative, got {v}")))
}

// ── ScheduleCursor ────────────────────────────────────────────────────────────

/// Stateful walk over a scheduler's activation grid.
///
/// Each call yields the current point and advances it by `step`.  There is
/// no upper bound check: callers compare against [`Scheduler::until`].
#[derive(Copy, Clone, Debug)]
pub struct ScheduleCursor {
    next: Time,
    step: u64,
}

impl ScheduleCursor {
    /// The point the next call to `next()` will return.
    pub fn peek(&self) -> Time {
        self.next
    }
}

impl Iterator for ScheduleCursor {
    type Item = Time;

    fn next(&mut self) -> Option<Time> {
        let t = self.next;
        self.next = t.offset(self.step);
        Some(t)
    }
}
