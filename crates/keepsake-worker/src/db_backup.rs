use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};

use keepsake_core::constants::{
    DB_BACKUP_EXTENSION, DB_BACKUP_PREFIX, FILE_TIMESTAMP_FORMAT, PARTIAL_SUFFIX,
};

use crate::context::DaemonContext;

fn backup_file_name(now: &DateTime<Utc>) -> String {
    format!(
        "{}{}{}",
        DB_BACKUP_PREFIX,
        now.with_timezone(&Local).format(FILE_TIMESTAMP_FORMAT),
        DB_BACKUP_EXTENSION
    )
}

async fn remove_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            partial = %partial.display(),
            error = %e,
            "Failed to remove partial database backup"
        ),
    }
}

/// Copy the SQLite database into the archive directory so it rides along with
/// the next replication.
///
/// Returns the backup path, or `None` when there is no database to copy.
#[tracing::instrument(skip(ctx))]
pub async fn backup_database(
    ctx: &DaemonContext,
    now: DateTime<Utc>,
) -> Result<Option<PathBuf>> {
    let Some(db_path) = ctx.config.database_path.as_ref() else {
        return Ok(None);
    };

    if !tokio::fs::try_exists(db_path).await.unwrap_or(false) {
        tracing::warn!(path = %db_path.display(), "Database not found, skipping backup");
        return Ok(None);
    }

    let name = backup_file_name(&now);
    let backup_path = ctx.config.archive_dir.join(&name);
    // Hidden while copying so a concurrent replication never uploads half a file.
    let partial = ctx.config.archive_dir.join(format!(".{}{}", name, PARTIAL_SUFFIX));

    if let Err(e) = tokio::fs::copy(db_path, &partial).await {
        remove_partial(&partial).await;
        return Err(e).with_context(|| format!("Failed to copy database {}", db_path.display()));
    }
    if let Err(e) = tokio::fs::rename(&partial, &backup_path).await {
        remove_partial(&partial).await;
        return Err(e).with_context(|| format!("Failed to move {} into place", name));
    }

    tracing::info!(backup = %backup_path.display(), "Database backed up");
    Ok(Some(backup_path))
}
