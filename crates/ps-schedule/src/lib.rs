//! `ps-schedule` — time-activation predicates and the global event queue.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                |
//! |-----------------|---------------------------------------------------------|
//! | [`scheduler`]   | `Scheduler`, `TimePoint`, `ScheduleCursor`              |
//! | [`event_queue`] | `EventQueue<T>`, `Event<T>`                             |
//! | [`error`]       | `ScheduleError`, `ScheduleResult<T>`                    |
//!
//! # Activation model (summary)
//!
//! A `Scheduler` is a pure predicate over time:
//!
//! ```text
//! active(t)  ⇔  from ≤ t < until  ∧  (t − from) mod step = 0
//! ```
//!
//! plus a `FINAL` flag tested only at the terminal point
//! `TimePoint::Final`, which no integer time reaches.
//!
//! The `EventQueue` orders entries by `(time, insertion order)` and refuses
//! entries timestamped before the time of the last popped entry.

pub mod error;
pub mod event_queue;
pub mod scheduler;

#[cfg(test)]
mod tests;

pub use error::{ScheduleError, ScheduleResult};
pub use event_queue::{Event, EventQueue};
pub use scheduler::{ScheduleCursor, Scheduler, TimePoint};
