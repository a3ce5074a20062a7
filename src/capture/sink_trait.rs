//! Capture Sink Trait
//!
//! This module defines the `CaptureSink` trait, the interface between the
//! session orchestrator and whatever durably records captured interactions.
//!
//! Implementors of this trait are responsible for:
//! - Opening the capture destination before the first interaction arrives
//! - Recording each interaction without loss or interleaving
//! - Flushing everything on close
//! - Answering status queries for a finished or in-progress capture
//!
//! `save` deliberately returns nothing: the orchestrator forwards samples
//! fire-and-forget and must never stall an exchange on storage. Failures are
//! retained on the sink's own error channel instead.

use uuid::Uuid;

use crate::capture::types::{CaptureStatus, Interaction};
use crate::error_handling::types::SinkError;

/// The `CaptureSink` trait defines the interface for capture persistence
/// backends.
///
/// Call order contract: `init` completes before the first `save`; `close` is
/// called after the last `save`. Calling `save` before `init` is a programmer
/// error and panics. `save` may be invoked from concurrent exchange tasks;
/// implementors serialize their own writes.
pub trait CaptureSink: Send + Sync {
    /// Durably creates/opens the destination for `capture_id`.
    fn init(&self, capture_id: Uuid) -> Result<(), SinkError>;

    /// Records one interaction.
    ///
    /// Must not silently lose data: a failed write is retained on the error
    /// channel and, when the failure is persistent, flagged fatal.
    fn save(&self, interaction: Interaction);

    /// Flushes and closes the capture. No interaction handed to `save`
    /// before this call may be lost.
    fn close(&self) -> Result<(), SinkError>;

    /// Summary counters for the capture.
    fn status(&self, capture_id: Uuid) -> Result<CaptureStatus, SinkError>;

    /// Takes the most recent save failure, if any, off the error channel.
    fn take_error(&self) -> Option<SinkError> {
        None
    }

    /// Whether the sink has hit a persistent storage failure. A fatal sink
    /// aborts the session; a non-fatal write failure does not.
    fn has_fatal_error(&self) -> bool {
        false
    }
}
