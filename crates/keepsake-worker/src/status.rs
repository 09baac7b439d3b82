use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fmt;

use keepsake_core::models::{list_archives, list_upload_units};
use keepsake_infra::capacity::measure;

use crate::context::DaemonContext;

/// Point-in-time view of the backup pipeline, as shown by `keepsake status`.
#[derive(Debug, Clone, Serialize)]
pub struct BackupStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_backup: Option<DateTime<Utc>>,
    pub disk_used_gb: Option<f64>,
    pub disk_total_gb: Option<f64>,
    pub disk_free_gb: Option<f64>,
    pub archive_count: usize,
    pub archive_bytes: u64,
    pub upload_units: usize,
    pub replication_configured: bool,
    pub destination: String,
}

impl BackupStatus {
    pub async fn collect(ctx: &DaemonContext) -> Result<Self> {
        let state = ctx.state.load();
        let config = &ctx.config;

        let usage = match measure(&ctx.inspector, &config.upload_dir).await {
            Ok(usage) => Some(usage),
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "Disk usage unavailable");
                None
            }
        };

        let archives = match list_archives(&config.archive_dir) {
            Ok(archives) => archives,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to list archives in {}", config.archive_dir.display())
                })
            }
        };

        let upload_units = match list_upload_units(&config.upload_dir) {
            Ok(units) => units.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to list upload units in {}", config.upload_dir.display())
                })
            }
        };

        Ok(Self {
            last_run: state.last_run_at(),
            last_backup: state.last_backup_at(),
            disk_used_gb: usage.map(|u| u.used_gb()),
            disk_total_gb: usage.map(|u| u.total_gb()),
            disk_free_gb: usage.map(|u| u.free_gb()),
            archive_count: archives.len(),
            archive_bytes: archives.iter().map(|a| a.size).sum(),
            upload_units,
            replication_configured: ctx.replicator.is_configured(),
            destination: ctx.replicator.destination(),
        })
    }
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Last archive run:  {}", format_time(self.last_run))?;
        writeln!(f, "Last backup:       {}", format_time(self.last_backup))?;
        match (self.disk_used_gb, self.disk_total_gb) {
            (Some(used), Some(total)) => {
                writeln!(f, "Disk usage:        {:.2} GB / {:.2} GB", used, total)?
            }
            _ => writeln!(f, "Disk usage:        Unknown")?,
        }
        writeln!(
            f,
            "Archives:          {} ({:.2} MB)",
            self.archive_count,
            self.archive_bytes as f64 / (1024.0 * 1024.0)
        )?;
        writeln!(f, "Upload units:      {}", self.upload_units)?;
        write!(
            f,
            "Destination:       {} ({})",
            self.destination,
            if self.replication_configured {
                "configured"
            } else {
                "not configured"
            }
        )
    }
}
