//! Well-known file names and defaults shared across crates.

/// Daemon state file, stored inside the archive directory.
pub const STATE_FILE_NAME: &str = "daemon_state.json";

/// Prefix and extension of batch archives (`batch_<YYYYMMDD_HHMMSS>.zip`).
pub const ARCHIVE_PREFIX: &str = "batch_";
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Suffix of an archive still being written or verified.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Prefix and extension of database snapshots written by the backup stage.
pub const DB_BACKUP_PREFIX: &str = "db_backup_";
pub const DB_BACKUP_EXTENSION: &str = ".sqlite";

/// Timestamp layout used in archive and backup file names.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
