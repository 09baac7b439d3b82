//! Shared dependencies for the daemon stages

use anyhow::{Context, Result};
use std::sync::Arc;

use keepsake_core::{DaemonConfig, StateStore};
use keepsake_infra::alert::{create_notifier, Notifier};
use keepsake_infra::capacity::{StorageInspector, SystemDiskInspector};
use keepsake_storage::{create_replicator, Replicator};

/// Everything a stage needs: configuration, the state store and the three
/// external seams (disk, remote, alerts).
#[derive(Clone)]
pub struct DaemonContext {
    pub config: Arc<DaemonConfig>,
    pub state: StateStore,
    pub inspector: Arc<dyn StorageInspector>,
    pub replicator: Arc<dyn Replicator>,
    pub notifier: Arc<dyn Notifier>,
}

impl DaemonContext {
    pub fn new(
        config: DaemonConfig,
        inspector: Arc<dyn StorageInspector>,
        replicator: Arc<dyn Replicator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let state = StateStore::new(config.state_file_path());
        Self {
            config: Arc::new(config),
            state,
            inspector,
            replicator,
            notifier,
        }
    }

    /// Build the production context: OS disk inspector, configured replication
    /// backend and alert channel.
    pub fn from_config(config: DaemonConfig) -> Result<Self> {
        let replicator =
            create_replicator(&config).context("Failed to create replication backend")?;
        let notifier = create_notifier(&config).context("Failed to create alert notifier")?;

        tracing::info!(
            backend = %replicator.backend_type(),
            destination = %replicator.destination(),
            configured = replicator.is_configured(),
            "Replication backend ready"
        );

        Ok(Self::new(
            config,
            Arc::new(SystemDiskInspector::new()),
            replicator,
            notifier,
        ))
    }
}

/// Create the upload, thumbnail and archive directories if missing.
pub fn ensure_directories(config: &DaemonConfig) -> Result<()> {
    for dir in [&config.upload_dir, &config.thumbnail_dir, &config.archive_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(())
}
