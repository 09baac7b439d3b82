use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use keepsake_infra::alert::Notifier;
use keepsake_infra::capacity::{DiskUsage, StorageInspector};
use keepsake_storage::{ReplicationBackend, ReplicationError, ReplicationResult, Replicator};

const ONE_TB: u64 = 1024 * 1024 * 1024 * 1024;

/// Forced answer for `exists_remote` on one object.
#[derive(Debug, Clone, Copy)]
pub enum Presence {
    Present,
    Absent,
    Unreachable,
}

/// Replicator that keeps the set of "uploaded" names in memory.
pub struct InMemoryReplicator {
    configured: AtomicBool,
    fail_replicate: AtomicBool,
    objects: Mutex<BTreeSet<String>>,
    overrides: Mutex<HashMap<String, Presence>>,
    exists_calls: Mutex<Vec<String>>,
    replicate_calls: AtomicUsize,
}

impl InMemoryReplicator {
    pub fn new() -> Self {
        Self {
            configured: AtomicBool::new(true),
            fail_replicate: AtomicBool::new(false),
            objects: Mutex::new(BTreeSet::new()),
            overrides: Mutex::new(HashMap::new()),
            exists_calls: Mutex::new(Vec::new()),
            replicate_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_configured(&self, configured: bool) {
        self.configured.store(configured, Ordering::SeqCst);
    }

    pub fn set_fail_replicate(&self, fail: bool) {
        self.fail_replicate.store(fail, Ordering::SeqCst);
    }

    /// Mark `name` as present remotely without a replicate call.
    pub fn insert(&self, name: &str) {
        self.objects.lock().unwrap().insert(name.to_string());
    }

    pub fn force(&self, name: &str, presence: Presence) {
        self.overrides
            .lock()
            .unwrap()
            .insert(name.to_string(), presence);
    }

    pub fn objects(&self) -> BTreeSet<String> {
        self.objects.lock().unwrap().clone()
    }

    pub fn exists_calls(&self) -> Vec<String> {
        self.exists_calls.lock().unwrap().clone()
    }

    pub fn replicate_calls(&self) -> usize {
        self.replicate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Replicator for InMemoryReplicator {
    async fn replicate(&self, local_dir: &Path) -> ReplicationResult<()> {
        self.replicate_calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_configured() {
            return Err(ReplicationError::NotConfigured("in-memory".to_string()));
        }
        if self.fail_replicate.load(Ordering::SeqCst) {
            return Err(ReplicationError::CommandFailed {
                command: "copy".to_string(),
                status: 1,
                stderr: "remote unavailable".to_string(),
            });
        }

        let mut objects = self.objects.lock().unwrap();
        for entry in std::fs::read_dir(local_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Ok(name) = entry.file_name().into_string() {
                    objects.insert(name);
                }
            }
        }
        Ok(())
    }

    async fn exists_remote(&self, name: &str) -> ReplicationResult<bool> {
        self.exists_calls.lock().unwrap().push(name.to_string());
        if !self.is_configured() {
            return Err(ReplicationError::NotConfigured("in-memory".to_string()));
        }

        let forced = self.overrides.lock().unwrap().get(name).copied();
        match forced {
            Some(Presence::Present) => Ok(true),
            Some(Presence::Absent) => Ok(false),
            Some(Presence::Unreachable) => Err(ReplicationError::Timeout {
                command: "lsjson".to_string(),
                timeout: std::time::Duration::from_secs(1),
            }),
            None => Ok(self.objects.lock().unwrap().contains(name)),
        }
    }

    fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    fn destination(&self) -> String {
        "memory:wedding_backup".to_string()
    }

    fn backend_type(&self) -> ReplicationBackend {
        ReplicationBackend::Local
    }
}

/// Inspector that replays a fixed sequence of `used` values.
///
/// The last value repeats once the script runs out.
pub struct ScriptedInspector {
    used: Mutex<VecDeque<u64>>,
    calls: AtomicUsize,
}

impl ScriptedInspector {
    pub fn new(used: &[u64]) -> Self {
        Self {
            used: Mutex::new(used.iter().copied().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn constant(used: u64) -> Self {
        Self::new(&[used])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StorageInspector for ScriptedInspector {
    fn disk_usage(&self, _path: &Path) -> anyhow::Result<DiskUsage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut used = self.used.lock().unwrap();
        let value = if used.len() > 1 {
            used.pop_front().unwrap()
        } else {
            *used.front().unwrap_or(&0)
        };
        Ok(DiskUsage::from_total_and_free(ONE_TB, ONE_TB - value))
    }
}

/// Inspector whose "used" is the total size of the files under `root`.
pub struct DirectorySizeInspector {
    root: PathBuf,
}

impl DirectorySizeInspector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl StorageInspector for DirectorySizeInspector {
    fn disk_usage(&self, _path: &Path) -> anyhow::Result<DiskUsage> {
        let used: u64 = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum();
        Ok(DiskUsage::from_total_and_free(ONE_TB, ONE_TB - used))
    }
}

/// Notifier that remembers every message.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
