//! `EventQueue` — the global time-ordered queue of the event engine.
//!
//! Entries are bucketed per distinct time in a `BTreeMap<Time, VecDeque<_>>`:
//! the earliest bucket is always the first key, and within a bucket entries
//! leave in insertion order.  That gives the `(time, insertion sequence)`
//! total order without storing or comparing sequence numbers on the hot path.
//!
//! The queue also owns the notion of "now": popping an entry moves `now` to
//! its time, and pushing an entry before `now` is rejected with
//! [`ScheduleError::OrderingViolation`].  Nothing is ever clamped.

use std::collections::{BTreeMap, VecDeque};

use ps_core::Time;

use crate::{ScheduleError, ScheduleResult};

/// One queued entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<T> {
    pub time: Time,
    /// Global insertion counter; strictly increasing over the queue's life.
    pub seq:  u64,
    pub body: T,
}

/// Time-ordered FIFO-within-time queue.
#[derive(Debug)]
pub struct EventQueue<T> {
    inner:    BTreeMap<Time, VecDeque<Event<T>>>,
    now:      Time,
    /// Cached total entry count for O(1) `len()`.
    total:    usize,
    next_seq: u64,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self { inner: BTreeMap::new(), now: Time::ZERO, total: 0, next_seq: 0 }
    }
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `body` at `time`.  Returns the entry's sequence number.
    pub fn push(&mut self, time: Time, body: T) -> ScheduleResult<u64> {
        if time < self.now {
            return Err(ScheduleError::OrderingViolation { time, now: self.now });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.inner.entry(time).or_default().push_back(Event { time, seq, body });
        self.total += 1;
        Ok(seq)
    }

    /// Enqueue `body` `delay` units after now.
    pub fn push_after(&mut self, delay: u64, body: T) -> ScheduleResult<u64> {
        self.push(self.now.offset(delay), body)
    }

    /// Remove the earliest entry and advance now to its time.
    pub fn pop(&mut self) -> Option<Event<T>> {
        let mut bucket = self.inner.first_entry()?;
        let event = bucket.get_mut().pop_front();
        if bucket.get().is_empty() {
            bucket.remove();
        }
        let event = event?;
        self.total -= 1;
        self.now = event.time;
        Some(event)
    }

    /// Time of the earliest entry, or `None` if empty.
    pub fn peek_time(&self) -> Option<Time> {
        self.inner.keys().next().copied()
    }

    /// Time of the most recently popped entry.
    #[inline]
    pub fn now(&self) -> Time {
        self.now
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of distinct future times that have at least one entry.
    pub fn time_count(&self) -> usize {
        self.inner.len()
    }

    /// Drop every entry.  `now` is kept, so ordering stays enforced.
    pub fn clear(&mut self) {
        self.inner.clear();
        self.total = 0;
    }
}
