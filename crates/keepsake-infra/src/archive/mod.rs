//! Batch archive handling
//!
//! Archives are zip files whose entries are stored under their path relative
//! to the upload root, so the first path component of every entry names the
//! upload unit it came from.

pub use reader::{extract_archive, read_manifest, top_level_units, verify_archive};
pub use writer::{build_archive, discard_partial, ArchiveStats};

mod reader;
mod writer;
