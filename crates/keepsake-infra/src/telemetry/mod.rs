//! Tracing initialization
//!
//! Logs go to stderr and, when configured, to an append-only log file next to
//! the archives.

mod init_basic;

pub use init_basic::{init_telemetry, open_log_file, shutdown_telemetry};
