//! Keepsake Storage Library
//!
//! This crate provides the remote replication abstraction and its backends.
//! The archive directory is pushed to an offsite destination, and the pruner
//! asks the same backend whether an individual archive has arrived there.
//!
//! # Object names
//!
//! Remote objects are addressed by their bare file name inside the configured
//! destination (`batch_20240601_180509.zip`). Names must not contain path
//! separators or `..`; validation is centralized in `names`.

pub mod factory;
#[cfg(feature = "replication-local")]
pub mod local;
pub(crate) mod names;
#[cfg(feature = "replication-rclone")]
pub mod rclone;
pub mod traits;

// Re-export commonly used types
pub use factory::create_replicator;
pub use keepsake_core::ReplicationBackend;
#[cfg(feature = "replication-local")]
pub use local::LocalMirrorReplicator;
#[cfg(feature = "replication-rclone")]
pub use rclone::RcloneReplicator;
pub use traits::{ReplicationError, ReplicationResult, Replicator};
