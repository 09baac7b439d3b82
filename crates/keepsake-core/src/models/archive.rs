use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::constants::{
    ARCHIVE_EXTENSION, ARCHIVE_PREFIX, FILE_TIMESTAMP_FORMAT, PARTIAL_SUFFIX,
};

/// `batch_<YYYYMMDD_HHMMSS>.zip` for the given local time.
pub fn archive_file_name(at: &DateTime<Local>) -> String {
    format!(
        "{}{}{}",
        ARCHIVE_PREFIX,
        at.format(FILE_TIMESTAMP_FORMAT),
        ARCHIVE_EXTENSION
    )
}

/// Whether `name` is a finished batch archive (not a partial or foreign file).
pub fn is_archive_name(name: &str) -> bool {
    name.starts_with(ARCHIVE_PREFIX)
        && name.ends_with(ARCHIVE_EXTENSION)
        && name.len() > ARCHIVE_PREFIX.len() + ARCHIVE_EXTENSION.len()
}

/// Hidden in-progress name for an archive being written.
pub fn partial_archive_name(final_name: &str) -> String {
    format!(".{}{}", final_name, PARTIAL_SUFFIX)
}

/// A finished batch archive in the archive directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveFile {
    pub name: String,
    pub path: PathBuf,
    /// File modify time; the FIFO order key for pruning.
    pub modified: SystemTime,
    pub size: u64,
}

/// List finished archives, oldest first (ties broken by name).
pub fn list_archives(archive_dir: &Path) -> io::Result<Vec<ArchiveFile>> {
    let mut archives = Vec::new();

    for entry in fs::read_dir(archive_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !is_archive_name(&name) {
            continue;
        }

        let metadata = entry.metadata()?;
        archives.push(ArchiveFile {
            name,
            path: entry.path(),
            modified: metadata.modified()?,
            size: metadata.len(),
        });
    }

    archives.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_archive_file_name() {
        let at = Local.with_ymd_and_hms(2024, 6, 1, 18, 5, 9).unwrap();
        assert_eq!(archive_file_name(&at), "batch_20240601_180509.zip");
    }

    #[test]
    fn test_is_archive_name() {
        assert!(is_archive_name("batch_20240601_180509.zip"));
        assert!(is_archive_name("batch_1.zip"));
        assert!(!is_archive_name("batch_.zip"));
        assert!(!is_archive_name(".batch_20240601_180509.zip.partial"));
        assert!(!is_archive_name("db_backup_20240601_180509.sqlite"));
        assert!(!is_archive_name("daemon_state.json"));
    }

    #[test]
    fn test_list_archives_oldest_first() {
        let dir = tempdir().unwrap();
        let now = SystemTime::now();

        for (name, age_secs) in [
            ("batch_b.zip", 10u64),
            ("batch_a.zip", 100),
            ("batch_c.zip", 1),
        ] {
            let path = dir.path().join(name);
            fs::write(&path, b"zip").unwrap();
            let file = fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(now - Duration::from_secs(age_secs)).unwrap();
        }
        fs::write(dir.path().join("daemon_state.json"), b"{}").unwrap();
        fs::write(dir.path().join(".batch_d.zip.partial"), b"zip").unwrap();

        let names: Vec<_> = list_archives(dir.path())
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["batch_a.zip", "batch_b.zip", "batch_c.zip"]);
    }
}
