//! Errors raised by the operation machinery itself.
//!
//! Item-level failures are not errors: they travel in
//! [`TaskResult::failed_item`](vaultops_core::TaskResult).

use thiserror::Error;
use vaultops_core::{OpsConfigBuilderError, SessionId};

/// Errors from running an operation.
#[derive(Debug, Error)]
pub enum OpsError {
    /// The unit of work panicked or could not be joined.
    #[error("Operation {session} failed: {message}")]
    TaskFailed { session: SessionId, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

pub type OpsResult<T> = Result<T, OpsError>;

impl From<OpsConfigBuilderError> for OpsError {
    fn from(err: OpsConfigBuilderError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}
