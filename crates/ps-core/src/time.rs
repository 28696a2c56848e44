//! Simulation time model.
//!
//! Time is a monotonically increasing integer counter.  In cycle-driven runs
//! one unit is one round; in event-driven runs the unit is whatever the
//! protocols agree on (the engine only orders by it).  Integer time keeps all
//! schedule arithmetic exact.
//!
//! The terminal "after the last round" point is not a `Time` value at all;
//! see `ps_schedule::TimePoint::Final`.

use std::fmt;

/// An absolute simulation time point.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time(pub u64);

impl Time {
    pub const ZERO: Time = Time(0);

    /// Largest representable time; used as the "unbounded" upper limit.
    pub const MAX: Time = Time(u64::MAX);

    /// Return the time `n` units after `self`, saturating at [`Time::MAX`].
    #[inline]
    pub fn offset(self, n: u64) -> Time {
        Time(self.0.saturating_add(n))
    }

    /// Units elapsed from `earlier` to `self`.
    ///
    /// # Panics
    /// Panics in debug mode if `earlier > self`.
    #[inline]
    pub fn since(self, earlier: Time) -> u64 {
        self.0 - earlier.0
    }

    #[inline]
    pub fn is_unbounded(self) -> bool {
        self == Time::MAX
    }
}

impl std::ops::Add<u64> for Time {
    type Output = Time;
    #[inline]
    fn add(self, rhs: u64) -> Time {
        self.offset(rhs)
    }
}

impl std::ops::Sub for Time {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Time) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            f.write_str("T∞")
        } else {
            write!(f, "T{}", self.0)
        }
    }
}
