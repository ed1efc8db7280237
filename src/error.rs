//! Error types for the runtime and the timeout policy

use thiserror::Error;

/// Raised when an aggressive timeout stops waiting for an operation.
///
/// The abandoned operation may still be running; it only learns about the
/// timeout through its cancellation token.
#[derive(Error, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[error("Operation cancelled")]
pub struct TaskCancelledError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    TaskCancelled(#[from] TaskCancelledError),

    #[error("timeout policy cannot be reconfigured after it has started executing")]
    PolicyInUse,

    #[error("Runtime not initialized")]
    NotInitialized,

    #[error("unknown timeout strategy: {0}")]
    UnknownStrategy(String),
}

pub type Result<T> = std::result::Result<T, Error>;
