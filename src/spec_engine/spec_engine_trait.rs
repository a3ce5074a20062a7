//! Spec Engine Trait
//!
//! This module defines the `SpecEngine` trait, the interface to the external
//! engine that holds the known API specification and computes diffs between
//! it and observed traffic.
//!
//! Implementors of this trait are responsible for:
//! - Ingesting interactions as a capture progresses
//! - Computing diff records once a capture is marked complete
//! - Applying reviewer-approved spec-change commands
//!
//! The diff algorithm itself is the engine's business; this crate treats it
//! as a black box.

use uuid::Uuid;

use crate::capture::types::{CaptureStatus, Interaction};
use crate::diff_review::types::{DiffRecord, SpecCommand};
use crate::error_handling::types::EngineError;

pub trait SpecEngine: Send + Sync {
    /// Feeds one observed interaction into the engine's working set for
    /// `capture_id`.
    fn ingest(&self, capture_id: Uuid, interaction: &Interaction) -> Result<(), EngineError>;

    /// Marks the capture finished. Diff records become available afterwards;
    /// further `ingest` calls for this capture are rejected.
    fn mark_capture_completed(&self, capture_id: Uuid) -> Result<(), EngineError>;

    /// Summary counters as the engine sees them.
    fn capture_status(&self, capture_id: Uuid) -> Result<CaptureStatus, EngineError>;

    /// One record per observed interaction, paired with the engine's
    /// interpretation where it has one. Only valid on a completed capture.
    fn diff_records(&self, capture_id: Uuid) -> Result<Vec<DiffRecord>, EngineError>;

    /// Applies a reviewer-approved set of spec-change commands.
    fn apply_commands(
        &self,
        commands: &[SpecCommand],
        added_ids: &[String],
        changed_ids: &[String],
    ) -> Result<(), EngineError>;
}
