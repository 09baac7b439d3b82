use crate::names::validate_object_name;
use crate::traits::{ReplicationError, ReplicationResult, Replicator};
use crate::ReplicationBackend;
use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// rclone exit codes that mean "nothing there" rather than a failure.
const EXIT_DIRECTORY_NOT_FOUND: i32 = 3;
const EXIT_FILE_NOT_FOUND: i32 = 4;

#[derive(Debug, Deserialize)]
struct LsJsonEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "IsDir", default)]
    is_dir: bool,
}

/// rclone-backed replication
///
/// Shells out to `rclone copy` and `rclone lsjson`. The remote itself
/// (`gdrive`, `b2`, ...) is defined in the rclone config file; this type only
/// knows its name and the path inside it.
#[derive(Clone, Debug)]
pub struct RcloneReplicator {
    binary: String,
    remote_name: String,
    remote_path: String,
    config_path: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl RcloneReplicator {
    /// Create a new RcloneReplicator
    ///
    /// # Arguments
    /// * `binary` - rclone executable (name on `PATH` or absolute path)
    /// * `remote_name` - remote as named in rclone.conf (e.g. "gdrive")
    /// * `remote_path` - folder inside the remote (e.g. "wedding_backup")
    /// * `config_path` - explicit rclone.conf; `None` uses rclone's default location
    /// * `timeout` - per-invocation limit; `None` waits indefinitely
    pub fn new(
        binary: impl Into<String>,
        remote_name: impl Into<String>,
        remote_path: impl Into<String>,
        config_path: Option<PathBuf>,
        timeout: Option<Duration>,
    ) -> ReplicationResult<Self> {
        let binary = binary.into();
        if binary.trim().is_empty() {
            return Err(ReplicationError::NotConfigured(
                "rclone binary path is empty".to_string(),
            ));
        }

        Ok(Self {
            binary,
            remote_name: remote_name.into().trim().trim_end_matches(':').to_string(),
            remote_path: remote_path.into().trim_matches('/').to_string(),
            config_path,
            timeout,
        })
    }

    /// The config file rclone will read: the explicit one, else `$RCLONE_CONFIG`,
    /// else `$HOME/.config/rclone/rclone.conf`.
    pub fn resolved_config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            return Some(path.clone());
        }
        if let Some(path) = env::var_os("RCLONE_CONFIG").filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(|home| PathBuf::from(home).join(".config").join("rclone").join("rclone.conf"))
    }

    fn destination_root(&self) -> String {
        format!("{}:{}", self.remote_name, self.remote_path)
    }

    fn object_path(&self, name: &str) -> String {
        if self.remote_path.is_empty() {
            format!("{}:{}", self.remote_name, name)
        } else {
            format!("{}:{}/{}", self.remote_name, self.remote_path, name)
        }
    }

    async fn run(&self, subcommand: &str, args: &[String]) -> ReplicationResult<Output> {
        let mut command = Command::new(&self.binary);
        command.arg(subcommand);
        if let Some(config) = &self.config_path {
            command.arg("--config").arg(config);
        }
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let label = format!("rclone {}", subcommand);
        let start = std::time::Instant::now();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| ReplicationError::Timeout {
                    command: label.clone(),
                    timeout: limit,
                })??,
            None => command.output().await?,
        };

        tracing::debug!(
            command = %label,
            status = ?output.status.code(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "rclone finished"
        );

        Ok(output)
    }
}

fn command_failed(command: &str, output: &Output) -> ReplicationError {
    ReplicationError::CommandFailed {
        command: command.to_string(),
        status: output.status.code().unwrap_or(-1),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

#[async_trait]
impl Replicator for RcloneReplicator {
    #[tracing::instrument(skip(self), fields(destination = %self.destination_root()))]
    async fn replicate(&self, local_dir: &Path) -> ReplicationResult<()> {
        if !self.is_configured() {
            return Err(ReplicationError::NotConfigured(format!(
                "no usable rclone config for remote '{}'",
                self.remote_name
            )));
        }

        let args = vec![
            local_dir.to_string_lossy().to_string(),
            self.destination_root(),
        ];
        let output = self.run("copy", &args).await?;

        if !output.status.success() {
            return Err(command_failed("rclone copy", &output));
        }

        tracing::info!(
            local_dir = %local_dir.display(),
            destination = %self.destination_root(),
            "rclone copy successful"
        );
        Ok(())
    }

    async fn exists_remote(&self, name: &str) -> ReplicationResult<bool> {
        validate_object_name(name)?;

        if !self.is_configured() {
            return Err(ReplicationError::NotConfigured(format!(
                "no usable rclone config for remote '{}'",
                self.remote_name
            )));
        }

        let output = self.run("lsjson", &[self.object_path(name)]).await?;

        match output.status.code() {
            Some(0) => {}
            Some(EXIT_DIRECTORY_NOT_FOUND) | Some(EXIT_FILE_NOT_FOUND) => return Ok(false),
            _ => return Err(command_failed("rclone lsjson", &output)),
        }

        let entries: Vec<LsJsonEntry> = serde_json::from_slice(&output.stdout).map_err(|e| {
            ReplicationError::BadResponse(format!("rclone lsjson output is not a JSON list: {}", e))
        })?;

        Ok(entries.iter().any(|entry| !entry.is_dir && entry.name == name))
    }

    fn is_configured(&self) -> bool {
        if self.remote_name.is_empty() {
            return false;
        }
        match self.resolved_config_path() {
            Some(path) => fs::read_to_string(&path)
                .map(|contents| !contents.trim().is_empty())
                .unwrap_or(false),
            None => false,
        }
    }

    fn destination(&self) -> String {
        self.destination_root()
    }

    fn backend_type(&self) -> ReplicationBackend {
        ReplicationBackend::Rclone
    }
}
