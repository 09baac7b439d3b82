//! Durable daemon state store
//!
//! The state file is read at the start of each stage and rewritten atomically
//! (temp file in the same directory, then rename) so a crash mid-write never
//! leaves a truncated file behind.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::models::DaemonState;

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state, reporting a malformed file as `StateCorrupt`.
    ///
    /// A missing file is the first-run condition and yields the default state.
    pub fn try_load(&self) -> Result<DaemonState, AppError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(DaemonState::default()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&raw).map_err(|e| AppError::StateCorrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Load the state, treating an unreadable or malformed file as empty.
    pub fn load(&self) -> DaemonState {
        match self.try_load() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Daemon state unreadable, starting from an empty state"
                );
                DaemonState::default()
            }
        }
    }

    /// Atomically replace the state file.
    pub fn save(&self, state: &DaemonState) -> Result<(), AppError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let body = serde_json::to_vec_pretty(state)
            .map_err(|e| AppError::Internal(format!("Failed to serialize daemon state: {}", e)))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| AppError::Io(e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            last_run = state.last_run,
            last_rclone_success = ?state.last_rclone_success,
            "Daemon state saved"
        );
        Ok(())
    }

    /// Load, apply `f`, and save. Returns the state as written.
    pub fn update<F>(&self, f: F) -> Result<DaemonState, AppError>
    where
        F: FnOnce(&mut DaemonState),
    {
        let mut state = self.load();
        f(&mut state);
        self.save(&state)?;
        Ok(state)
    }

    /// Remove the state file, returning the daemon to its first-run condition.
    pub fn reset(&self) -> Result<(), AppError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
