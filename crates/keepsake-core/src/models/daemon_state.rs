use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Cross-cycle state persisted in `daemon_state.json`.
///
/// Timestamps are unix seconds as floats so the file stays readable by the
/// admin dashboard, which only looks at `last_rclone_success`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonState {
    /// Watermark: every upload unit with mtime at or before this has been archived.
    #[serde(default)]
    pub last_run: f64,
    /// Time of the most recent confirmed replication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rclone_success: Option<f64>,
    /// Keys written by other tools are kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DaemonState {
    /// Move the watermark to `cutoff` if that is later than the current one.
    ///
    /// Returns whether the watermark moved. A cutoff behind the watermark (clock
    /// stepped backwards) leaves it unchanged.
    pub fn advance_watermark(&mut self, cutoff: f64) -> bool {
        if cutoff > self.last_run {
            self.last_run = cutoff;
            true
        } else {
            false
        }
    }

    pub fn record_replication_success(&mut self, at: DateTime<Utc>) {
        self.last_rclone_success = Some(datetime_to_unix(&at));
    }

    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        (self.last_run > 0.0).then(|| unix_to_datetime(self.last_run)).flatten()
    }

    pub fn last_backup_at(&self) -> Option<DateTime<Utc>> {
        self.last_rclone_success.and_then(unix_to_datetime)
    }
}

pub fn datetime_to_unix(at: &DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_nanos()) / 1_000_000_000.0
}

pub fn unix_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos).single()
}

/// Seconds since the epoch for a filesystem timestamp; pre-epoch times map to 0.
pub fn system_time_to_unix(at: SystemTime) -> f64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
