use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::Disks;

use keepsake_core::constants::BYTES_PER_GB;
use keepsake_core::AppError;

/// Usage of the volume hosting a path, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl DiskUsage {
    pub fn from_total_and_free(total: u64, free: u64) -> Self {
        Self {
            total,
            used: total.saturating_sub(free),
            free,
        }
    }

    pub fn used_gb(&self) -> f64 {
        self.used as f64 / BYTES_PER_GB
    }

    pub fn free_gb(&self) -> f64 {
        self.free as f64 / BYTES_PER_GB
    }

    pub fn total_gb(&self) -> f64 {
        self.total as f64 / BYTES_PER_GB
    }
}

/// Reports disk usage for the volume containing a path.
pub trait StorageInspector: Send + Sync {
    fn disk_usage(&self, path: &Path) -> Result<DiskUsage>;
}

/// One mounted filesystem as reported by the OS.
#[derive(Debug, Clone)]
pub struct MountInfo {
    pub mount_point: PathBuf,
    pub total: u64,
    pub available: u64,
}

/// Pick the mount with the longest mount point that is a prefix of `path`.
///
/// `/` always matches, so a nested mount like `/data` wins only when it
/// actually covers the path.
pub fn select_mount<'a>(path: &Path, mounts: &'a [MountInfo]) -> Option<&'a MountInfo> {
    mounts
        .iter()
        .filter(|m| path.starts_with(&m.mount_point))
        .max_by_key(|m| m.mount_point.components().count())
}

/// `StorageInspector` backed by the OS mount table.
#[derive(Debug, Clone, Default)]
pub struct SystemDiskInspector;

impl SystemDiskInspector {
    pub fn new() -> Self {
        Self
    }
}

impl StorageInspector for SystemDiskInspector {
    fn disk_usage(&self, path: &Path) -> Result<DiskUsage> {
        let canonical = path
            .canonicalize()
            .with_context(|| format!("Failed to canonicalize path: {}", path.display()))?;

        let disks = Disks::new_with_refreshed_list();
        let mounts: Vec<MountInfo> = disks
            .iter()
            .map(|disk| MountInfo {
                mount_point: disk.mount_point().to_path_buf(),
                total: disk.total_space(),
                available: disk.available_space(),
            })
            .collect();

        let mount = select_mount(&canonical, &mounts).ok_or_else(|| {
            anyhow!(
                "Could not determine disk space for path: {}",
                path.display()
            )
        })?;

        tracing::debug!(
            path = %path.display(),
            mount_point = %mount.mount_point.display(),
            total_bytes = mount.total,
            available_bytes = mount.available,
            "Disk usage measured"
        );

        Ok(DiskUsage::from_total_and_free(mount.total, mount.available))
    }
}

/// Measure usage without blocking the runtime.
pub async fn measure(
    inspector: &Arc<dyn StorageInspector>,
    path: &Path,
) -> Result<DiskUsage, AppError> {
    let inspector = Arc::clone(inspector);
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || inspector.disk_usage(&owned))
        .await
        .map_err(|e| AppError::Internal(format!("disk usage task panicked: {}", e)))?
        .map_err(|e| AppError::DiskUsage {
            path: path.to_path_buf(),
            reason: format!("{:#}", e),
        })
}
