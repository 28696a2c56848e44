//! Framework error type.
//!
//! Sub-crates define their own error enums and wrap `PsError` as one variant
//! via `#[from]`, so configuration and sampling failures keep their identity
//! all the way up to the process entry point.

use thiserror::Error;

/// The base error type for `ps-core` and a common variant for sub-crates.
#[derive(Debug, Error)]
pub enum PsError {
    /// A required configuration key is absent.
    #[error("parameter {0:?} not found")]
    MissingParameter(String),

    /// A configuration value is present but cannot be used.
    #[error("illegal parameter {name:?}: {reason}")]
    IllegalParameter { name: String, reason: String },

    /// `next()` was called on a sampler with nothing left to emit.
    #[error("iteration exhausted: no elements left")]
    IterationExhausted,

    #[error("invalid distribution parameter: {0}")]
    Distribution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PsError {
    /// Shorthand for [`PsError::IllegalParameter`].
    pub fn illegal(name: impl Into<String>, reason: impl Into<String>) -> Self {
        PsError::IllegalParameter { name: name.into(), reason: reason.into() }
    }

    /// `true` for the two configuration categories that the entry point
    /// reports as parameter problems.
    pub fn is_parameter_error(&self) -> bool {
        matches!(self, PsError::MissingParameter(_) | PsError::IllegalParameter { .. })
    }
}

/// Shorthand result type for all `ps-*` crates.
pub type PsResult<T> = Result<T, PsError>;
