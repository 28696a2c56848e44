use ps_core::{PsError, Time};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    /// An event was enqueued before the queue's current time.
    #[error("event scheduled at {time} but current time is already {now}")]
    OrderingViolation { time: Time, now: Time },

    #[error(transparent)]
    Param(#[from] PsError),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
