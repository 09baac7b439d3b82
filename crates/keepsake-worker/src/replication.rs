use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use keepsake_core::AppError;

use crate::context::DaemonContext;

/// Push the archive directory to the remote and record the success time.
///
/// On failure `last_rclone_success` is left untouched so the dashboard keeps
/// showing the last backup that actually landed.
#[tracing::instrument(skip(ctx), fields(destination = %ctx.replicator.destination()))]
pub async fn replicate_archives(ctx: &DaemonContext, now: DateTime<Utc>) -> Result<()> {
    let archive_dir = &ctx.config.archive_dir;

    ctx.replicator
        .replicate(archive_dir)
        .await
        .map_err(AppError::from)
        .with_context(|| format!("Replication of {} failed", archive_dir.display()))?;

    ctx.state
        .update(|s| s.record_replication_success(now))
        .context("Failed to record replication success")?;

    tracing::info!(
        backend = %ctx.replicator.backend_type(),
        "Replication successful"
    );
    Ok(())
}
