//! Keepsake Worker – the archive daemon's stages and loop.
//!
//! Each cycle runs, strictly in order: database backup, batch archiving,
//! replication of the archive directory, and retention pruning. Stages share a
//! `DaemonContext` and take the current time as a parameter so they can be
//! driven deterministically.

mod archiver;
mod context;
mod daemon;
mod db_backup;
mod pruner;
mod purge;
mod replication;
mod status;

pub use archiver::{archive_eligible_units, ArchiveOutcome};
pub use context::{ensure_directories, DaemonContext};
pub use daemon::{CycleReport, Daemon, Stage, StageError};
pub use db_backup::backup_database;
pub use pruner::{prune, PruneReport};
pub use purge::{purge_all, PurgeReport};
pub use replication::replicate_archives;
pub use status::BackupStatus;
