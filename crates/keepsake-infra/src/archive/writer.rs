use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};

use keepsake_core::AppError;
use walkdir::WalkDir;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// Entry sizes at or above this need the zip64 extension.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// What went into a freshly written archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Total entries, directories included.
    pub entries: usize,
    pub files: usize,
    /// Uncompressed bytes of all file entries.
    pub bytes: u64,
}

/// Zip entry name for `path` relative to `root`, `/`-separated.
fn entry_name(root: &Path, path: &Path) -> Result<String, String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| format!("{} is outside {}", path.display(), root.display()))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| format!("non UTF-8 path: {}", path.display()))?,
            ),
            _ => return Err(format!("unexpected path component in {}", path.display())),
        }
    }

    if parts.is_empty() {
        return Err(format!("empty entry name for {}", path.display()));
    }
    Ok(parts.join("/"))
}

/// Write a Deflate-compressed zip of every file under each of `units` to `dest`.
///
/// Entries keep their path relative to `upload_root`. `dest` must not exist;
/// on error it may be left half-written and the caller is expected to remove it.
pub fn build_archive(
    upload_root: &Path,
    units: &[PathBuf],
    dest: &Path,
) -> Result<ArchiveStats, AppError> {
    let build_err = |reason: String| AppError::ArchiveBuild {
        archive: dest.to_path_buf(),
        reason,
    };

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| build_err(format!("failed to create archive file: {}", e)))?;

    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    let dir_options = FileOptions::default().unix_permissions(0o755);

    let mut stats = ArchiveStats::default();

    for unit in units {
        for entry in WalkDir::new(unit).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| build_err(format!("failed to walk {}: {}", unit.display(), e)))?;
            let path = entry.path();
            let name = entry_name(upload_root, path).map_err(build_err)?;

            if entry.file_type().is_dir() {
                zip.add_directory(format!("{}/", name), dir_options)
                    .map_err(|e| build_err(format!("failed to add directory {}: {}", name, e)))?;
                stats.entries += 1;
                continue;
            }

            if !entry.file_type().is_file() {
                tracing::warn!(path = %path.display(), "Skipping non-regular file");
                continue;
            }

            let size = entry
                .metadata()
                .map_err(|e| build_err(format!("failed to stat {}: {}", path.display(), e)))?
                .len();

            zip.start_file(name.as_str(), options.large_file(size >= ZIP64_THRESHOLD))
                .map_err(|e| build_err(format!("failed to add file {}: {}", name, e)))?;
            let mut source = File::open(path)
                .map_err(|e| build_err(format!("failed to open {}: {}", path.display(), e)))?;
            let copied = io::copy(&mut source, &mut zip)
                .map_err(|e| build_err(format!("failed to write {}: {}", name, e)))?;

            stats.entries += 1;
            stats.files += 1;
            stats.bytes += copied;
        }
    }

    let writer = zip
        .finish()
        .map_err(|e| build_err(format!("failed to finalize archive: {}", e)))?;
    let file = writer
        .into_inner()
        .map_err(|e| build_err(format!("failed to flush archive: {}", e.error())))?;
    file.sync_all()
        .map_err(|e| build_err(format!("failed to sync archive: {}", e)))?;

    tracing::debug!(
        archive = %dest.display(),
        entries = stats.entries,
        files = stats.files,
        bytes = stats.bytes,
        "Archive written"
    );

    Ok(stats)
}

/// Remove a partial archive left by a failed build or verification.
pub fn discard_partial(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_entry_name() {
        let root = Path::new("/data/uploads");
        assert_eq!(
            entry_name(root, Path::new("/data/uploads/1700000000_abcd1234_Ann/a.jpg")).unwrap(),
            "1700000000_abcd1234_Ann/a.jpg"
        );
        assert_eq!(
            entry_name(root, Path::new("/data/uploads/u/thumbs/a.jpg")).unwrap(),
            "u/thumbs/a.jpg"
        );
        assert!(entry_name(root, Path::new("/data/uploads")).is_err());
        assert!(entry_name(root, Path::new("/elsewhere/a.jpg")).is_err());
    }

    #[test]
    fn test_build_refuses_existing_destination() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("batch_1.zip");
        fs::write(&dest, b"already here").unwrap();

        let result = build_archive(dir.path(), &[], &dest);
        assert!(matches!(result, Err(AppError::ArchiveBuild { .. })));
        assert_eq!(fs::read(&dest).unwrap(), b"already here");
    }

    #[test]
    fn test_build_counts_entries() {
        let dir = tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        let unit = uploads.join("1700000000_abcd1234_Ann");
        fs::create_dir_all(unit.join("thumbs")).unwrap();
        fs::write(unit.join("a.jpg"), b"aaaa").unwrap();
        fs::write(unit.join("thumbs").join("a.jpg"), b"bb").unwrap();

        let dest = dir.path().join("out.zip");
        let stats = build_archive(&uploads, &[unit], &dest).unwrap();

        // unit dir, thumbs dir, two files
        assert_eq!(stats.entries, 4);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.bytes, 6);
    }

    #[test]
    fn test_discard_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.partial");
        discard_partial(&path).unwrap();
        fs::write(&path, b"x").unwrap();
        discard_partial(&path).unwrap();
        assert!(!path.exists());
    }
}
