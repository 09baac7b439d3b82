//! Disk usage inspection
//!
//! The pruner decides whether to reclaim space from the usage of the volume
//! hosting the archive directory, not from the size of any one directory.

pub use inspector::{
    measure, select_mount, DiskUsage, MountInfo, StorageInspector, SystemDiskInspector,
};

mod inspector;
