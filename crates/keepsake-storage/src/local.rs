//! Local mirror replication
//!
//! Copies the archive directory into another directory, typically a mounted
//! USB disk or network share. Also used as the test double for rclone since it
//! has the same incremental and presence semantics.

use crate::names::validate_object_name;
use crate::traits::{ReplicationError, ReplicationResult, Replicator};
use crate::ReplicationBackend;
use async_trait::async_trait;
use keepsake_core::constants::PARTIAL_SUFFIX;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

pub struct LocalMirrorReplicator {
    mirror_path: PathBuf,
}

impl LocalMirrorReplicator {
    /// Create a new LocalMirrorReplicator
    ///
    /// The mirror directory is not created here; a missing mirror means
    /// "not configured" so an unmounted disk is never mistaken for an empty one.
    pub fn new(mirror_path: impl Into<PathBuf>) -> Self {
        Self {
            mirror_path: mirror_path.into(),
        }
    }

    pub fn mirror_path(&self) -> &Path {
        &self.mirror_path
    }
}

/// Whether `dest` needs to be (re)written from `src`.
fn needs_copy(src: &fs::Metadata, dest: &Path) -> bool {
    match fs::metadata(dest) {
        Ok(existing) => {
            existing.len() != src.len()
                || match (existing.modified(), src.modified()) {
                    (Ok(a), Ok(b)) => a != b,
                    _ => true,
                }
        }
        Err(_) => true,
    }
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(PARTIAL_SUFFIX))
}

/// `.<name>.partial` next to `target`.
fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}{}", name, PARTIAL_SUFFIX))
}

/// Copy `src` to `target` so that `target` only ever holds a complete file.
///
/// The data goes to a hidden partial first and is synced before the rename.
/// On failure the partial is removed and `target` is left as it was.
fn copy_into_place(src: &Path, target: &Path, modified: Option<SystemTime>) -> io::Result<()> {
    let partial = partial_path(target);

    let result = (|| -> io::Result<()> {
        let mut reader = fs::File::open(src)?;
        let mut writer = fs::File::create(&partial)?;
        io::copy(&mut reader, &mut writer)?;
        // Carry the mtime over so the next pass recognises the file as unchanged.
        if let Some(modified) = modified {
            writer.set_modified(modified)?;
        }
        writer.sync_all()?;
        fs::rename(&partial, target)
    })();

    if result.is_err() {
        match fs::remove_file(&partial) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                partial = %partial.display(),
                error = %e,
                "Failed to remove partial mirror copy"
            ),
        }
    }
    result
}

fn mirror_tree(source: &Path, mirror: &Path) -> ReplicationResult<(u64, u64)> {
    let mut copied = 0u64;
    let mut skipped = 0u64;

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| {
            ReplicationError::IoError(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;

        let relative = match entry.path().strip_prefix(source) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let target = mirror.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if !entry.file_type().is_file() || is_partial(entry.path()) {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| {
            ReplicationError::IoError(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("metadata read failed")),
            )
        })?;

        if !needs_copy(&metadata, &target) {
            skipped += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        copy_into_place(entry.path(), &target, metadata.modified().ok())?;
        copied += 1;
    }

    Ok((copied, skipped))
}

#[async_trait]
impl Replicator for LocalMirrorReplicator {
    #[tracing::instrument(skip(self), fields(destination = %self.mirror_path.display()))]
    async fn replicate(&self, local_dir: &Path) -> ReplicationResult<()> {
        if !self.is_configured() {
            return Err(ReplicationError::NotConfigured(format!(
                "mirror directory {} does not exist",
                self.mirror_path.display()
            )));
        }

        let source = local_dir.to_path_buf();
        let mirror = self.mirror_path.clone();
        let (copied, skipped) = tokio::task::spawn_blocking(move || mirror_tree(&source, &mirror))
            .await
            .map_err(|e| {
                ReplicationError::IoError(std::io::Error::other(format!(
                    "mirror task panicked: {}",
                    e
                )))
            })??;

        tracing::info!(copied = copied, unchanged = skipped, "Local mirror updated");
        Ok(())
    }

    async fn exists_remote(&self, name: &str) -> ReplicationResult<bool> {
        validate_object_name(name)?;

        if !self.is_configured() {
            return Err(ReplicationError::NotConfigured(format!(
                "mirror directory {} does not exist",
                self.mirror_path.display()
            )));
        }

        match tokio::fs::metadata(self.mirror_path.join(name)).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn is_configured(&self) -> bool {
        self.mirror_path.is_dir()
    }

    fn destination(&self) -> String {
        self.mirror_path.display().to_string()
    }

    fn backend_type(&self) -> ReplicationBackend {
        ReplicationBackend::Local
    }
}
