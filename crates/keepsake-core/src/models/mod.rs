//! Data models for the daemon
//!
//! Upload units are the guests' upload folders, archives are the batch zips
//! built from them, and the daemon state carries the watermark between cycles.

mod archive;
mod daemon_state;
mod upload_unit;

pub use archive::*;
pub use daemon_state::*;
pub use upload_unit::*;
