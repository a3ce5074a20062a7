//! Capture session core module.
//!
//! This module provides the types and submodules for running one capture
//! session: the session record itself, its status, and the orchestrator
//! that wires the proxy, the supervised command, and the capture sink
//! together.

use serde::{Deserialize, Serialize};

/// Submodule for the capture session record.
pub mod session;
/// Submodule for the session orchestrator.
pub mod session_manager;

pub use session::CaptureSession;
pub use session_manager::SessionManager;

/// Represents the current status of a capture session.
///
/// Variants:
/// - `Initializing`: the session exists but capture has not started.
/// - `Capturing`: the proxy is live and interactions are being recorded.
/// - `Completed`: the session shut down in order; the capture is usable.
/// - `Aborted`: the session ended on a fatal failure; any partial capture
///   recorded before the failure remains usable.
///
/// `Completed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Initializing,
    Capturing,
    Completed,
    Aborted,
}
