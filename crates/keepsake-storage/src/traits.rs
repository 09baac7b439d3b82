//! Replication abstraction trait
//!
//! This module defines the Replicator trait that all replication backends must implement.

use crate::ReplicationBackend;
use async_trait::async_trait;
use keepsake_core::AppError;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Replication operation errors
///
/// None of these mean "the object is absent"; absence is `Ok(false)` from
/// `exists_remote`. Callers that gate deletion must treat every error as
/// "not proven present".
#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("Replication backend not configured: {0}")]
    NotConfigured(String),

    #[error("{command} exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("{command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("Unexpected backend response: {0}")]
    BadResponse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ReplicationError> for AppError {
    fn from(err: ReplicationError) -> Self {
        AppError::Replication(err.to_string())
    }
}

/// Result type for replication operations
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Remote replication trait
///
/// The destination is fixed when the backend is built; `replicate` pushes a
/// local tree to it and `exists_remote` checks for a single object there.
#[async_trait]
pub trait Replicator: Send + Sync {
    /// Push every file under `local_dir` to the destination.
    ///
    /// Must be incremental: unchanged objects are not transferred again.
    async fn replicate(&self, local_dir: &Path) -> ReplicationResult<()>;

    /// Whether an object named exactly `name` exists at the destination.
    ///
    /// `Ok(false)` means the backend answered and the object is absent. An
    /// unconfigured or unreachable backend is an error, never `Ok(false)`.
    async fn exists_remote(&self, name: &str) -> ReplicationResult<bool>;

    /// Whether credentials/configuration for the destination are present.
    fn is_configured(&self) -> bool;

    /// Human-readable destination, for logs.
    fn destination(&self) -> String;

    /// Get the replication backend type
    fn backend_type(&self) -> ReplicationBackend;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_app_error() {
        let err: AppError = ReplicationError::CommandFailed {
            command: "rclone copy".to_string(),
            status: 7,
            stderr: "quota exceeded".to_string(),
        }
        .into();

        assert!(matches!(err, AppError::Replication(_)));
        assert!(err.is_recoverable());
        assert_eq!(err.error_code(), "REPLICATION_FAILED");
        assert!(err.to_string().contains("quota exceeded"));
    }
}
