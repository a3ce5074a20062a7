//! Capture persistence subsystem.
//!
//! Every interaction the proxy emits flows through a [`CaptureSink`]. The
//! crate ships two implementations:
//! - `file_saver`: filesystem-backed saver writing one JSON line per
//!   interaction under the capture's directory.
//! - `saver_with_diffs`: wraps the file saver and forwards each saved
//!   interaction to the external spec/diff engine.

pub mod file_saver;
pub mod saver_with_diffs;
pub mod sink_trait;
pub mod types;

pub use file_saver::FileCaptureSaver;
pub use saver_with_diffs::CaptureSaverWithDiffs;
pub use sink_trait::CaptureSink;
pub use types::{CaptureStatus, CapturedBody, CapturedRequest, CapturedResponse, Interaction};
