//! Admin purge: wipe all uploads, thumbnails and archives.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use keepsake_core::DaemonConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub entries_removed: usize,
}

/// Remove everything inside `dir` except `keep`, then make sure `dir` exists.
///
/// The directory itself stays, since it may be a mount point.
fn clear_directory(dir: &Path, keep: Option<&Path>) -> Result<usize> {
    let mut removed = 0;

    match fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries {
                let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
                let path = entry.path();
                if keep == Some(path.as_path()) {
                    continue;
                }

                let file_type = entry
                    .file_type()
                    .with_context(|| format!("Failed to inspect {}", path.display()))?;
                let result = if file_type.is_dir() {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_file(&path)
                };
                result.with_context(|| format!("Failed to remove {}", path.display()))?;
                removed += 1;
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", dir.display())),
    }

    fs::create_dir_all(dir).with_context(|| format!("Failed to recreate {}", dir.display()))?;
    Ok(removed)
}

/// Delete every upload unit, thumbnail, archive, database backup and the
/// daemon state, leaving empty directories behind.
///
/// The daemon log file, if it lives in one of these directories, is kept.
pub fn purge_all(config: &DaemonConfig) -> Result<PurgeReport> {
    let keep = config.log_file.as_deref();
    let mut report = PurgeReport::default();

    for dir in [&config.upload_dir, &config.thumbnail_dir, &config.archive_dir] {
        let removed = clear_directory(dir, keep)?;
        tracing::warn!(dir = %dir.display(), removed = removed, "Directory purged");
        report.entries_removed += removed;
    }

    Ok(report)
}
