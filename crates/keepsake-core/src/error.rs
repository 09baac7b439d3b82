//! Error types module
//!
//! All daemon failures are unified under `AppError`. The variants follow the
//! daemon's failure taxonomy: transient failures are retried on the next cycle,
//! corruption is alerted on, and invariant-protecting refusals are not errors at
//! all (they are logged warnings inside the pruner).

use std::io;
use std::path::PathBuf;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Warning level - for recoverable issues retried next cycle
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Disk usage query failed for {path}: {reason}")]
    DiskUsage { path: PathBuf, reason: String },

    #[error("Archive build failed for {archive}: {reason}")]
    ArchiveBuild { archive: PathBuf, reason: String },

    #[error("Archive verification failed for {archive}: {reason}")]
    ArchiveVerification { archive: PathBuf, reason: String },

    #[error("Replication error: {0}")]
    Replication(String),

    #[error("Daemon state at {path} is corrupt: {reason}")]
    StateCorrupt { path: PathBuf, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Io(_) => "IO_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::DiskUsage { .. } => "DISK_USAGE_ERROR",
            AppError::ArchiveBuild { .. } => "ARCHIVE_BUILD_FAILED",
            AppError::ArchiveVerification { .. } => "ARCHIVE_CORRUPT",
            AppError::Replication(_) => "REPLICATION_FAILED",
            AppError::StateCorrupt { .. } => "STATE_CORRUPT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the next cycle can be expected to succeed without operator action
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Io(_)
            | AppError::DiskUsage { .. }
            | AppError::Replication(_)
            | AppError::StateCorrupt { .. }
            | AppError::ArchiveBuild { .. } => true,
            AppError::ArchiveVerification { .. } | AppError::Config(_) | AppError::Internal(_) => {
                false
            }
        }
    }

    /// Log level for this error
    pub fn log_level(&self) -> LogLevel {
        match self {
            // A corrupt state file is tolerated by treating it as empty.
            AppError::StateCorrupt { .. } => LogLevel::Warn,
            AppError::Replication(_) | AppError::DiskUsage { .. } => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}
