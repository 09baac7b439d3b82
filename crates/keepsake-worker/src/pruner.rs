//! Retention pruner
//!
//! Reclaims local space by deleting archives oldest-first, together with the
//! upload units they contain, but only archives whose copy on the remote has
//! been confirmed. Upload units are never removed on their own.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use keepsake_core::models::{list_archives, ArchiveFile};
use keepsake_infra::archive::{read_manifest, top_level_units};
use keepsake_infra::capacity::{measure, DiskUsage};

use crate::context::DaemonContext;

/// What one pruning pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneReport {
    pub archives_deleted: Vec<String>,
    pub units_deleted: Vec<String>,
    /// Archives kept because the remote could not confirm them.
    pub archives_skipped: Vec<String>,
    pub final_usage: Option<DiskUsage>,
    pub over_budget: bool,
    /// Verification was required but the replicator has no configuration.
    pub refused_unconfigured: bool,
}

async fn read_manifest_blocking(path: PathBuf) -> Result<Vec<String>> {
    tokio::task::spawn_blocking(move || read_manifest(&path))
        .await
        .map_err(|e| anyhow!("spawn_blocking for manifest read: {}", e))?
}

/// Remove `upload_dir/<unit>` if it is a real directory.
async fn remove_unit(upload_dir: &Path, unit: &str) -> Result<bool> {
    let path = upload_dir.join(unit);
    match tokio::fs::symlink_metadata(&path).await {
        Ok(metadata) if metadata.is_dir() => {
            tokio::fs::remove_dir_all(&path)
                .await
                .with_context(|| format!("Failed to remove upload unit {}", path.display()))?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to inspect {}", path.display())),
    }
}

/// Whether the remote confirms `archive`. Errors count as "not confirmed".
async fn confirmed_remote(ctx: &DaemonContext, archive: &ArchiveFile) -> bool {
    match ctx.replicator.exists_remote(&archive.name).await {
        Ok(true) => true,
        Ok(false) => {
            tracing::warn!(archive = %archive.name, "Skipping archive not found on remote");
            false
        }
        Err(e) => {
            tracing::warn!(
                archive = %archive.name,
                error = %e,
                "Skipping archive, remote presence could not be checked"
            );
            false
        }
    }
}

/// Delete verified archives until usage of the archive volume is within budget.
#[tracing::instrument(skip(ctx), fields(archive_dir = %ctx.config.archive_dir.display()))]
pub async fn prune(ctx: &DaemonContext, verify_remote: bool) -> Result<PruneReport> {
    let config = &ctx.config;
    let budget = config.disk_budget_bytes();
    let mut report = PruneReport::default();

    if verify_remote && !ctx.replicator.is_configured() {
        tracing::warn!(
            backend = %ctx.replicator.backend_type(),
            "Replication not configured, refusing to prune without remote verification"
        );
        report.refused_unconfigured = true;
        return Ok(report);
    }

    let mut usage = measure(&ctx.inspector, &config.archive_dir)
        .await
        .context("Failed to measure disk usage")?;

    if usage.used <= budget {
        tracing::debug!(used_bytes = usage.used, budget_bytes = budget, "Within budget");
        report.final_usage = Some(usage);
        return Ok(report);
    }

    tracing::warn!(
        used_gb = usage.used_gb(),
        limit_gb = config.max_local_storage_gb,
        "Disk usage over limit, pruning"
    );

    let archives = list_archives(&config.archive_dir)
        .with_context(|| format!("Failed to list archives in {}", config.archive_dir.display()))?;

    for archive in archives {
        if verify_remote && !confirmed_remote(ctx, &archive).await {
            report.archives_skipped.push(archive.name);
            continue;
        }

        let units = match read_manifest_blocking(archive.path.clone()).await {
            Ok(entries) => top_level_units(&entries),
            Err(e) => {
                tracing::warn!(
                    archive = %archive.name,
                    error = %format!("{:#}", e),
                    "Archive manifest unreadable, deleting archive but keeping upload units"
                );
                Vec::new()
            }
        };

        if let Err(e) = tokio::fs::remove_file(&archive.path).await {
            tracing::warn!(archive = %archive.name, error = %e, "Failed to delete archive");
            report.archives_skipped.push(archive.name);
            continue;
        }
        tracing::info!(archive = %archive.name, units = units.len(), "Deleted verified archive");

        for unit in units {
            match remove_unit(&config.upload_dir, &unit).await {
                Ok(true) => {
                    tracing::info!(unit = %unit, "Deleted archived upload unit");
                    report.units_deleted.push(unit);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(unit = %unit, error = %format!("{:#}", e), "Failed to delete upload unit")
                }
            }
        }
        report.archives_deleted.push(archive.name);

        usage = measure(&ctx.inspector, &config.archive_dir)
            .await
            .context("Failed to re-measure disk usage")?;
        if usage.used <= budget {
            break;
        }
    }

    report.final_usage = Some(usage);
    report.over_budget = usage.used > budget;

    if report.over_budget {
        tracing::warn!(
            used_gb = usage.used_gb(),
            limit_gb = config.max_local_storage_gb,
            skipped = report.archives_skipped.len(),
            "Still over limit after pruning, no more verified archives to delete"
        );
    } else {
        tracing::info!(
            used_gb = usage.used_gb(),
            archives_deleted = report.archives_deleted.len(),
            units_deleted = report.units_deleted.len(),
            "Pruning complete"
        );
    }

    Ok(report)
}
