use ps_core::PsError;
use ps_network::NetworkError;
use ps_schedule::ScheduleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    /// A configuration value names a component type nobody registered.
    #[error("unknown {kind} type {key:?}")]
    UnknownComponent {
        kind: &'static str,
        key:  String,
    },

    #[error(transparent)]
    Param(#[from] PsError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl SimError {
    /// `true` if the failure is a missing or malformed configuration value,
    /// wherever in the stack it was raised.
    pub fn is_parameter_error(&self) -> bool {
        match self {
            SimError::Param(e)
            | SimError::Network(NetworkError::Param(e))
            | SimError::Schedule(ScheduleError::Param(e)) => e.is_parameter_error(),
            SimError::UnknownComponent { .. } => true,
            _ => false,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
