//! Keepsake Core Library
//!
//! This crate provides the configuration, error types, domain models and the
//! durable daemon state store shared by every Keepsake component.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod replication_types;
pub mod state;

// Re-export commonly used types
pub use config::DaemonConfig;
pub use error::{AppError, LogLevel};
pub use models::{ArchiveFile, DaemonState, UploadUnit, UploadUnitName};
pub use replication_types::ReplicationBackend;
pub use state::StateStore;
