//! Keepsake Infrastructure Library
//!
//! This crate provides the infrastructure pieces the daemon stages are built on:
//! - Telemetry initialization
//! - Disk usage inspection
//! - Archive writing, verification, manifest reading and extraction
//! - Alert delivery

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "alert")]
pub mod alert;

#[cfg(feature = "capacity")]
pub mod capacity;

#[cfg(feature = "archive")]
pub mod archive;

// Re-export commonly used types
#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};

#[cfg(feature = "alert")]
pub use alert::{create_notifier, NoOpNotifier, Notifier, WebhookNotifier};

#[cfg(feature = "capacity")]
pub use capacity::{DiskUsage, StorageInspector, SystemDiskInspector};

#[cfg(feature = "archive")]
pub use archive::{
    build_archive, discard_partial, extract_archive, read_manifest, top_level_units, verify_archive, ArchiveStats,
};
