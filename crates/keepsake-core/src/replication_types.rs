use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Replication backend types
///
/// Defined in core because configuration selects it before any backend exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationBackend {
    /// `rclone copy` / `rclone lsjson` against a configured remote.
    Rclone,
    /// Plain directory mirror (mounted NAS, USB disk).
    Local,
}

impl FromStr for ReplicationBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rclone" => Ok(ReplicationBackend::Rclone),
            "local" => Ok(ReplicationBackend::Local),
            _ => Err(anyhow::anyhow!("Invalid replication backend: {}", s)),
        }
    }
}

impl Display for ReplicationBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ReplicationBackend::Rclone => write!(f, "rclone"),
            ReplicationBackend::Local => write!(f, "local"),
        }
    }
}
