//! Batch archiver
//!
//! Packs every upload unit that settled since the last run into one verified
//! zip, then moves the watermark. A failed batch leaves the watermark alone so
//! the same units are picked up again next cycle.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};

use keepsake_core::constants::{ARCHIVE_EXTENSION, PARTIAL_SUFFIX};
use keepsake_core::models::{
    archive_file_name, datetime_to_unix, list_upload_units, partial_archive_name,
};
use keepsake_core::AppError;
use keepsake_infra::archive::{build_archive, discard_partial, verify_archive, ArchiveStats};

use crate::context::DaemonContext;

/// Result of one archiving pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveOutcome {
    /// Nothing was eligible; the watermark moved to `cutoff`.
    Idle { cutoff: f64 },
    /// A new archive was written and verified.
    Archived {
        archive: String,
        units: Vec<String>,
        files: usize,
        bytes: u64,
        cutoff: f64,
    },
}

/// First free archive name in `dir`, appending `_<n>` to the stem on collision.
fn unique_archive_name(dir: &Path, base: &str) -> String {
    if !dir.join(base).exists() {
        return base.to_string();
    }
    let stem = base.strip_suffix(ARCHIVE_EXTENSION).unwrap_or(base);
    (1u32..)
        .map(|n| format!("{}_{}{}", stem, n, ARCHIVE_EXTENSION))
        .find(|candidate| !dir.join(candidate).exists())
        .unwrap_or_else(|| base.to_string())
}

/// Remove every hidden `*.partial` file in `dir` left by an interrupted run.
///
/// Returns how many were removed. Failures are logged and skipped.
fn sweep_partials(dir: &Path) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Could not scan for stale partials");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with('.') || !name.ends_with(PARTIAL_SUFFIX) {
            continue;
        }
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        match discard_partial(&entry.path()) {
            Ok(()) => {
                tracing::warn!(partial = %name, "Removed stale partial file");
                removed += 1;
            }
            Err(e) => tracing::warn!(partial = %name, error = %e, "Failed to remove stale partial"),
        }
    }
    removed
}

/// Build and verify an archive at `partial`, off the async runtime.
async fn write_verified(
    upload_dir: PathBuf,
    units: Vec<PathBuf>,
    partial: PathBuf,
) -> Result<ArchiveStats, AppError> {
    tokio::task::spawn_blocking(move || {
        let stats = build_archive(&upload_dir, &units, &partial)?;
        verify_archive(&partial, stats.entries)?;
        Ok(stats)
    })
    .await
    .map_err(|e| AppError::Internal(format!("archive task panicked: {}", e)))?
}

/// Archive every upload unit whose mtime lies in `(last_run, now - window]`.
#[tracing::instrument(skip(ctx), fields(upload_dir = %ctx.config.upload_dir.display()))]
pub async fn archive_eligible_units(
    ctx: &DaemonContext,
    now: DateTime<Utc>,
) -> Result<ArchiveOutcome> {
    let config = &ctx.config;
    let archive_dir = config.archive_dir.clone();
    tokio::task::spawn_blocking(move || sweep_partials(&archive_dir))
        .await
        .map_err(|e| anyhow!("spawn_blocking for partial sweep: {}", e))?;

    let last_run = ctx.state.load().last_run;
    let cutoff = datetime_to_unix(&now) - config.eligibility_window().as_secs_f64();

    let upload_dir = config.upload_dir.clone();
    let units = tokio::task::spawn_blocking(move || list_upload_units(&upload_dir))
        .await
        .map_err(|e| anyhow!("spawn_blocking for upload listing: {}", e))?
        .with_context(|| {
            format!("Failed to list upload units in {}", config.upload_dir.display())
        })?;

    let eligible: Vec<_> = units
        .into_iter()
        .filter(|unit| unit.is_within(last_run, cutoff))
        .collect();

    if eligible.is_empty() {
        ctx.state
            .update(|s| {
                s.advance_watermark(cutoff);
            })
            .context("Failed to persist watermark")?;
        tracing::info!(cutoff = cutoff, "No new upload units to archive");
        return Ok(ArchiveOutcome::Idle { cutoff });
    }

    let name = unique_archive_name(
        &config.archive_dir,
        &archive_file_name(&now.with_timezone(&Local)),
    );
    let final_path = config.archive_dir.join(&name);
    let partial_path = config.archive_dir.join(partial_archive_name(&name));

    // Only an interrupted run in this same second can have left this name.
    if let Err(e) = discard_partial(&partial_path) {
        let err = anyhow!(e).context(format!("Failed to remove stale {}", partial_path.display()));
        return Err(fail_batch(ctx, &name, &partial_path, err).await);
    }

    let unit_names: Vec<String> = eligible.iter().map(|u| u.name.clone()).collect();
    let unit_paths: Vec<PathBuf> = eligible.iter().map(|u| u.path.clone()).collect();

    tracing::info!(
        archive = %name,
        units = unit_names.len(),
        last_run = last_run,
        cutoff = cutoff,
        "Archiving upload units"
    );

    let written = write_verified(config.upload_dir.clone(), unit_paths, partial_path.clone()).await;
    let stats = match written {
        Ok(stats) => stats,
        Err(e) => return Err(fail_batch(ctx, &name, &partial_path, e.into()).await),
    };

    if let Err(e) = tokio::fs::rename(&partial_path, &final_path).await {
        let err = anyhow!(e).context(format!("Failed to move {} into place", name));
        return Err(fail_batch(ctx, &name, &partial_path, err).await);
    }

    // Without the new watermark these units would be archived again next
    // cycle, so the archive must not outlive a failed state write.
    if let Err(e) = ctx.state.update(|s| {
        s.advance_watermark(cutoff);
    }) {
        let err = anyhow!(e).context("Failed to persist watermark after archiving");
        return Err(fail_batch(ctx, &name, &final_path, err).await);
    }

    tracing::info!(
        archive = %name,
        units = unit_names.len(),
        files = stats.files,
        bytes = stats.bytes,
        "Archive created and verified"
    );

    Ok(ArchiveOutcome::Archived {
        archive: name,
        units: unit_names,
        files: stats.files,
        bytes: stats.bytes,
        cutoff,
    })
}

/// Remove the failed batch's file, alert, and hand the error back.
async fn fail_batch(
    ctx: &DaemonContext,
    name: &str,
    path: &Path,
    err: anyhow::Error,
) -> anyhow::Error {
    if let Err(e) = discard_partial(path) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove failed archive");
    }
    tracing::error!(archive = %name, error = %format!("{:#}", err), "Archival failed");
    ctx.notifier
        .notify(&format!("Archival failed for {}: {:#}", name, err))
        .await;
    err
}
