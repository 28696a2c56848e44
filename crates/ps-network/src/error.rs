use ps_core::{NodeId, ProtocolId, PsError};
use ps_schedule::ScheduleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    /// A node could not be duplicated into a new population member.
    #[error("cannot clone node: {0}")]
    CloningFailure(String),

    #[error("{0} is not in the network")]
    NodeNotFound(NodeId),

    #[error("{0} is already in the network")]
    DuplicateNode(NodeId),

    #[error("node index {index} out of range (network size {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no protocol slot {0}")]
    UnknownSlot(ProtocolId),

    #[error("no protocol named {0:?}")]
    UnknownProtocol(String),

    /// Raised by protocol, control or initializer code.
    #[error("protocol failure: {0}")]
    Protocol(String),

    #[error(transparent)]
    Param(#[from] PsError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

pub type NetworkResult<T> = Result<T, NetworkError>;
