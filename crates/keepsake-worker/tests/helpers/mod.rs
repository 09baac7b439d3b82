//! Test helpers: fakes for the daemon's external seams and on-disk fixtures.
//!
//! Run from workspace root: `cargo test -p keepsake-worker`.

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use keepsake_core::{DaemonConfig, StateStore};
use keepsake_infra::alert::Notifier;
use keepsake_infra::capacity::StorageInspector;
use keepsake_storage::Replicator;
use keepsake_worker::DaemonContext;

pub use fakes::{
    DirectorySizeInspector, InMemoryReplicator, Presence, RecordingNotifier, ScriptedInspector,
};
pub use fixtures::*;

/// A daemon rooted in a temp dir, wired to fakes the test can inspect.
pub struct TestEnv {
    pub dir: TempDir,
    pub replicator: Arc<InMemoryReplicator>,
    pub notifier: Arc<RecordingNotifier>,
    pub inspector: Arc<dyn StorageInspector>,
    pub ctx: DaemonContext,
}

impl TestEnv {
    /// Unlimited budget, configured in-memory remote, empty 1 TB disk.
    pub fn new() -> Self {
        Self::with(|_| {}, |_| Arc::new(ScriptedInspector::constant(0)))
    }

    /// Build an environment after letting the test adjust the config.
    ///
    /// `inspector` receives the temp root so it can measure the test's own tree.
    pub fn with<F, I>(adjust: F, inspector: I) -> Self
    where
        F: FnOnce(&mut DaemonConfig),
        I: FnOnce(&Path) -> Arc<dyn StorageInspector>,
    {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DaemonConfig::for_root(dir.path());
        adjust(&mut config);
        keepsake_worker::ensure_directories(&config).unwrap();

        let inspector = inspector(dir.path());
        let replicator = Arc::new(InMemoryReplicator::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = DaemonContext::new(
            config,
            Arc::clone(&inspector),
            Arc::clone(&replicator) as Arc<dyn Replicator>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        );

        Self {
            dir,
            replicator,
            notifier,
            inspector,
            ctx,
        }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.ctx.config
    }

    pub fn state(&self) -> &StateStore {
        &self.ctx.state
    }
}

/// Budget in GB that converts to roughly `bytes` bytes.
pub fn budget_gb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}
