//! Configuration module
//!
//! The daemon is configured from the environment (optionally seeded from a
//! `.env` file). The resulting `DaemonConfig` is passed explicitly to every
//! component; nothing reads the environment after startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{BYTES_PER_GB, STATE_FILE_NAME};
use crate::error::AppError;
use crate::replication_types::ReplicationBackend;

const MAX_LOCAL_STORAGE_GB: f64 = 40.0;
const ARCHIVE_ELIGIBILITY_MINUTES: u64 = 30;
const DAEMON_INTERVAL_SECS: u64 = 600;
const RCLONE_TIMEOUT_SECS: u64 = 3600;
const ALERT_TIMEOUT_SECS: u64 = 10;

/// Archive daemon configuration
#[derive(Clone, Debug)]
pub struct DaemonConfig {
    pub environment: String,
    // Filesystem layout
    pub upload_dir: PathBuf,
    pub thumbnail_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub database_path: Option<PathBuf>,
    /// `None` disables the log file; stderr logging is always on.
    pub log_file: Option<PathBuf>,
    // Retention
    pub max_local_storage_gb: f64,
    pub eligibility_window_secs: u64,
    pub cycle_interval_secs: u64,
    pub verify_remote: bool,
    // Replication
    pub replication_backend: ReplicationBackend,
    pub rclone_binary: String,
    pub rclone_remote_name: String,
    pub rclone_remote_path: String,
    pub rclone_config: Option<PathBuf>,
    /// 0 disables the timeout.
    pub rclone_timeout_secs: u64,
    pub mirror_path: Option<PathBuf>,
    // Alerting
    pub alert_webhook_url: Option<String>,
    pub alert_timeout_secs: u64,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Unset or empty keys fall back to defaults; values that are present but
    /// unparseable are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = get("ENVIRONMENT")
            .or_else(|| get("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let archive_dir = PathBuf::from(get("ARCHIVE_DIR").unwrap_or_else(|| "/data/archives".to_string()));

        let log_file = match get("DAEMON_LOG_FILE") {
            Some(v) if v.eq_ignore_ascii_case("none") => None,
            Some(v) => Some(PathBuf::from(v)),
            None => Some(archive_dir.join("daemon.log")),
        };

        let max_local_storage_gb = match get("MAX_LOCAL_STORAGE_GB") {
            Some(v) => v
                .trim()
                .parse::<f64>()
                .map_err(|_| anyhow::anyhow!("MAX_LOCAL_STORAGE_GB must be a number, got {:?}", v))?,
            None => MAX_LOCAL_STORAGE_GB,
        };

        let eligibility_minutes =
            parse_or(&get, "ARCHIVE_ELIGIBILITY_MINUTES", ARCHIVE_ELIGIBILITY_MINUTES)?;

        let replication_backend = match get("REPLICATION_BACKEND") {
            Some(v) => v.parse::<ReplicationBackend>()?,
            None => ReplicationBackend::Rclone,
        };

        let verify_remote = match get("PRUNE_VERIFY_REMOTE") {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| anyhow::anyhow!("PRUNE_VERIFY_REMOTE must be true or false, got {:?}", v))?,
            None => true,
        };

        Ok(DaemonConfig {
            environment,
            upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| "/data/uploads".to_string())),
            thumbnail_dir: PathBuf::from(
                get("THUMBNAIL_DIR").unwrap_or_else(|| "/data/thumbnails".to_string()),
            ),
            archive_dir,
            database_path: Some(PathBuf::from(
                get("DATABASE_PATH").unwrap_or_else(|| "/data/database.sqlite".to_string()),
            )),
            log_file,
            max_local_storage_gb,
            eligibility_window_secs: eligibility_minutes * 60,
            cycle_interval_secs: parse_or(&get, "DAEMON_INTERVAL_SECS", DAEMON_INTERVAL_SECS)?,
            verify_remote,
            replication_backend,
            rclone_binary: get("RCLONE_BINARY").unwrap_or_else(|| "rclone".to_string()),
            rclone_remote_name: get("RCLONE_REMOTE_NAME").unwrap_or_else(|| "gdrive".to_string()),
            rclone_remote_path: get("RCLONE_REMOTE_PATH")
                .unwrap_or_else(|| "wedding_backup".to_string()),
            rclone_config: get("RCLONE_CONFIG").map(PathBuf::from),
            rclone_timeout_secs: parse_or(&get, "RCLONE_TIMEOUT_SECS", RCLONE_TIMEOUT_SECS)?,
            mirror_path: get("REPLICATION_MIRROR_PATH").map(PathBuf::from),
            alert_webhook_url: get("DISCORD_WEBHOOK_URL"),
            alert_timeout_secs: parse_or(&get, "ALERT_TIMEOUT_SECS", ALERT_TIMEOUT_SECS)?,
        })
    }

    /// Configuration rooted at `root`, with every directory beneath it.
    ///
    /// Intended for tests and local runs; the budget is effectively unlimited
    /// and no log file is written.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        DaemonConfig {
            environment: "test".to_string(),
            upload_dir: root.join("uploads"),
            thumbnail_dir: root.join("thumbnails"),
            archive_dir: root.join("archives"),
            database_path: Some(root.join("database.sqlite")),
            log_file: None,
            max_local_storage_gb: f64::MAX,
            eligibility_window_secs: ARCHIVE_ELIGIBILITY_MINUTES * 60,
            cycle_interval_secs: DAEMON_INTERVAL_SECS,
            verify_remote: true,
            replication_backend: ReplicationBackend::Local,
            rclone_binary: "rclone".to_string(),
            rclone_remote_name: "gdrive".to_string(),
            rclone_remote_path: "wedding_backup".to_string(),
            rclone_config: None,
            rclone_timeout_secs: RCLONE_TIMEOUT_SECS,
            mirror_path: Some(root.join("mirror")),
            alert_webhook_url: None,
            alert_timeout_secs: ALERT_TIMEOUT_SECS,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_local_storage_gb.is_nan() || self.max_local_storage_gb <= 0.0 {
            return Err(AppError::Config(
                "MAX_LOCAL_STORAGE_GB must be greater than zero".to_string(),
            ));
        }

        if self.cycle_interval_secs == 0 {
            return Err(AppError::Config(
                "DAEMON_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }

        if self.upload_dir == self.archive_dir {
            return Err(AppError::Config(
                "UPLOAD_DIR and ARCHIVE_DIR must be different directories".to_string(),
            ));
        }

        match self.replication_backend {
            ReplicationBackend::Rclone => {
                if self.rclone_remote_name.trim().is_empty() {
                    return Err(AppError::Config(
                        "RCLONE_REMOTE_NAME must be set when using the rclone backend".to_string(),
                    ));
                }
            }
            ReplicationBackend::Local => {
                if self.mirror_path.is_none() {
                    return Err(AppError::Config(
                        "REPLICATION_MIRROR_PATH must be set when using the local backend".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Disk budget in bytes for the volume hosting the archive directory.
    pub fn disk_budget_bytes(&self) -> u64 {
        let bytes = self.max_local_storage_gb * BYTES_PER_GB;
        if bytes >= u64::MAX as f64 {
            u64::MAX
        } else {
            bytes as u64
        }
    }

    pub fn eligibility_window(&self) -> Duration {
        Duration::from_secs(self.eligibility_window_secs)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn rclone_timeout(&self) -> Option<Duration> {
        (self.rclone_timeout_secs > 0).then(|| Duration::from_secs(self.rclone_timeout_secs))
    }

    pub fn alert_timeout(&self) -> Duration {
        Duration::from_secs(self.alert_timeout_secs)
    }

    pub fn state_file_path(&self) -> PathBuf {
        self.archive_dir.join(STATE_FILE_NAME)
    }
}

fn parse_or<G>(get: &G, key: &str, default: u64) -> Result<u64, anyhow::Error>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer, got {:?}", key, v)),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
