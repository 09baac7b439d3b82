use chrono::{DateTime, Duration, Utc};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use keepsake_core::models::list_archives;

pub fn to_system_time(at: DateTime<Utc>) -> SystemTime {
    SystemTime::from(at)
}

/// `minutes` before `now`, as a filesystem timestamp.
pub fn minutes_before(now: DateTime<Utc>, minutes: i64) -> SystemTime {
    to_system_time(now - Duration::minutes(minutes))
}

pub fn set_mtime(path: &Path, at: SystemTime) {
    // Directories open read-only on Linux, which is enough for futimens as owner.
    let file = if path.is_dir() {
        File::open(path).unwrap()
    } else {
        File::options().write(true).open(path).unwrap()
    };
    file.set_modified(at).unwrap();
}

/// Create an upload unit with the given files and stamp its mtime last.
pub fn make_unit(upload_dir: &Path, name: &str, files: &[(&str, &[u8])], mtime: SystemTime) -> PathBuf {
    let unit = upload_dir.join(name);
    fs::create_dir_all(&unit).unwrap();
    for (relative, contents) in files {
        let path = unit.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
    }
    set_mtime(&unit, mtime);
    unit
}

/// Deterministic, poorly compressible bytes.
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        })
        .collect()
}

/// Names of finished archives, oldest first.
pub fn archive_names(archive_dir: &Path) -> Vec<String> {
    list_archives(archive_dir)
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect()
}

/// Whether any hidden partial archive is lying around.
pub fn has_partials(archive_dir: &Path) -> bool {
    fs::read_dir(archive_dir)
        .unwrap()
        .filter_map(Result::ok)
        .any(|e| e.file_name().to_string_lossy().ends_with(".partial"))
}
