use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path};

use keepsake_core::AppError;
use zip::ZipArchive;

fn open(path: &Path) -> io::Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Reopen an archive and read every entry to the end.
///
/// Reading an entry fully makes the zip reader check its CRC-32, so a
/// truncated or bit-flipped archive fails here. Returns the entry count,
/// which must equal `expected_entries`.
pub fn verify_archive(path: &Path, expected_entries: usize) -> Result<usize, AppError> {
    let verify_err = |reason: String| AppError::ArchiveVerification {
        archive: path.to_path_buf(),
        reason,
    };

    let mut archive = open(path).map_err(|e| verify_err(format!("not a readable zip: {}", e)))?;

    if archive.len() != expected_entries {
        return Err(verify_err(format!(
            "expected {} entries, found {}",
            expected_entries,
            archive.len()
        )));
    }

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| verify_err(format!("entry {} unreadable: {}", index, e)))?;
        let name = entry.name().to_string();
        io::copy(&mut entry, &mut io::sink())
            .map_err(|e| verify_err(format!("entry {} failed integrity check: {}", name, e)))?;
    }

    Ok(archive.len())
}

/// Entry names from the archive's central directory.
pub fn read_manifest(path: &Path) -> Result<Vec<String>> {
    let archive =
        open(path).with_context(|| format!("Failed to open archive: {}", path.display()))?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Distinct first path components of `entries`, sorted.
///
/// Only plain names count; an entry that is absolute or starts with `.` or
/// `..` contributes nothing, so the result can be joined onto the upload
/// root safely.
pub fn top_level_units(entries: &[String]) -> Vec<String> {
    let mut units = BTreeSet::new();
    for entry in entries {
        if entry.contains('\\') {
            continue;
        }
        if let Some(Component::Normal(first)) = Path::new(entry).components().next() {
            if let Some(first) = first.to_str() {
                units.insert(first.to_string());
            }
        }
    }
    units.into_iter().collect()
}

/// Extract every entry of `archive` below `dest`, returning the number of files written.
///
/// Entries whose name would resolve outside `dest` abort the extraction.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize> {
    let mut zip =
        open(archive).with_context(|| format!("Failed to open archive: {}", archive.display()))?;
    fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create destination: {}", dest.display()))?;

    let mut files = 0;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .with_context(|| format!("Failed to read entry {}", index))?;

        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow!("Refusing to extract unsafe entry: {}", entry.name()))?;
        let target = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut out = File::create(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to extract {}", relative.display()))?;
        files += 1;
    }

    tracing::info!(
        archive = %archive.display(),
        dest = %dest.display(),
        files = files,
        "Archive extracted"
    );
    Ok(files)
}
