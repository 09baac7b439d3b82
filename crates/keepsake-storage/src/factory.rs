#[cfg(feature = "replication-local")]
use crate::LocalMirrorReplicator;
#[cfg(feature = "replication-rclone")]
use crate::RcloneReplicator;
use crate::{ReplicationBackend, ReplicationError, ReplicationResult, Replicator};
use keepsake_core::DaemonConfig;
use std::sync::Arc;

/// Create a replication backend based on configuration
///
/// Construction never touches the network; whether the destination is
/// actually usable is reported later by `is_configured`.
pub fn create_replicator(config: &DaemonConfig) -> ReplicationResult<Arc<dyn Replicator>> {
    match config.replication_backend {
        #[cfg(feature = "replication-rclone")]
        ReplicationBackend::Rclone => {
            let replicator = RcloneReplicator::new(
                config.rclone_binary.clone(),
                config.rclone_remote_name.clone(),
                config.rclone_remote_path.clone(),
                config.rclone_config.clone(),
                config.rclone_timeout(),
            )?;
            Ok(Arc::new(replicator))
        }

        #[cfg(not(feature = "replication-rclone"))]
        ReplicationBackend::Rclone => Err(ReplicationError::NotConfigured(
            "rclone backend not available (replication-rclone feature not enabled)".to_string(),
        )),

        #[cfg(feature = "replication-local")]
        ReplicationBackend::Local => {
            let mirror = config.mirror_path.clone().ok_or_else(|| {
                ReplicationError::NotConfigured("REPLICATION_MIRROR_PATH not configured".to_string())
            })?;
            Ok(Arc::new(LocalMirrorReplicator::new(mirror)))
        }

        #[cfg(not(feature = "replication-local"))]
        ReplicationBackend::Local => Err(ReplicationError::NotConfigured(
            "local mirror backend not available (replication-local feature not enabled)"
                .to_string(),
        )),
    }
}
