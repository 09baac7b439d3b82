use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::daemon_state::system_time_to_unix;

const ANONYMOUS: &str = "Anonymous";
const DISAMBIGUATOR_LEN: usize = 8;

/// Strip a guest display name down to alphanumerics, spaces, `_` and `-`.
///
/// Falls back to `Anonymous` when nothing usable remains.
pub fn sanitize_display_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        ANONYMOUS.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parsed upload folder name: `<unix_seconds>_<8 hex>_<display name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadUnitName {
    pub uploaded_at: i64,
    pub disambiguator: String,
    pub display_name: String,
}

impl UploadUnitName {
    pub fn new(uploaded_at: i64, disambiguator: &str, display_name: &str) -> Self {
        Self {
            uploaded_at,
            disambiguator: disambiguator.to_lowercase(),
            display_name: sanitize_display_name(display_name),
        }
    }

    /// Parse a folder name produced by the upload handler.
    ///
    /// Returns `None` for folders that don't follow the convention; such
    /// folders are still archived, only their metadata is unknown.
    pub fn parse(folder: &str) -> Option<Self> {
        let mut parts = folder.splitn(3, '_');
        let uploaded_at = parts.next()?.parse::<i64>().ok()?;
        let disambiguator = parts.next()?;
        let display_name = parts.next()?;

        if disambiguator.len() != DISAMBIGUATOR_LEN
            || !disambiguator.chars().all(|c| c.is_ascii_hexdigit())
            || display_name.is_empty()
        {
            return None;
        }

        Some(Self {
            uploaded_at,
            disambiguator: disambiguator.to_string(),
            display_name: display_name.to_string(),
        })
    }

    pub fn folder_name(&self) -> String {
        self.to_string()
    }
}

impl Display for UploadUnitName {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}_{}_{}",
            self.uploaded_at, self.disambiguator, self.display_name
        )
    }
}

/// A guest's upload folder directly under the upload root.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadUnit {
    /// Folder name, which is also the first component of every archived path.
    pub name: String,
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl UploadUnit {
    pub fn modified_unix(&self) -> f64 {
        system_time_to_unix(self.modified)
    }

    pub fn parsed_name(&self) -> Option<UploadUnitName> {
        UploadUnitName::parse(&self.name)
    }

    /// Whether this unit falls in the half-open window `(after, up_to]`.
    pub fn is_within(&self, after: f64, up_to: f64) -> bool {
        let t = self.modified_unix();
        t > after && t <= up_to
    }
}

/// List the top-level directories of the upload root, oldest first.
///
/// Plain files at the top level are not upload units and are skipped, as are
/// names that are not valid UTF-8.
pub fn list_upload_units(upload_root: &Path) -> io::Result<Vec<UploadUnit>> {
    let mut units = Vec::new();

    for entry in fs::read_dir(upload_root)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if !file_type.is_dir() {
            continue;
        }

        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!(path = %entry.path().display(), "Skipping upload folder with non UTF-8 name");
            continue;
        };

        let modified = entry.metadata()?.modified()?;
        units.push(UploadUnit {
            name,
            path: entry.path(),
            modified,
        });
    }

    units.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(units)
}
