//! Review state machine for a finished capture.
//!
//! One [`DiffReview`] walks a capture's diff records in order. The reviewer
//! either applies a record's interpretation (submitting its commands to the
//! spec engine and dropping the record from the pending set), skips it
//! (retained, marked reviewed-but-not-applied), or discards the whole review
//! (remaining records abandoned, no further spec mutation). `Reviewed` and
//! `Discarded` are terminal.

use std::sync::Arc;

use log::{debug, info};
use uuid::Uuid;

use crate::diff_review::types::{DiffRecord, DisplayContext, Interpretation};
use crate::error_handling::types::ReviewError;
use crate::spec_engine::SpecEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Unreviewed,
    Reviewing,
    Reviewed,
    Discarded,
}

pub struct DiffReview {
    capture_id: Uuid,
    engine: Arc<dyn SpecEngine>,
    records: Vec<PendingRecord>,
    cursor: usize,
    state: ReviewState,
}

struct PendingRecord {
    record: DiffRecord,
    skipped: bool,
}

impl DiffReview {
    /// Builds a review over records the caller already holds.
    ///
    /// With no records there is nothing to review and the machine starts in
    /// the terminal `Reviewed` state.
    pub fn new(capture_id: Uuid, engine: Arc<dyn SpecEngine>, records: Vec<DiffRecord>) -> Self {
        let state = if records.is_empty() {
            ReviewState::Reviewed
        } else {
            debug!("[{}] review loaded {} diff record(s)", capture_id, records.len());
            ReviewState::Reviewing
        };
        Self {
            capture_id,
            engine,
            records: records
                .into_iter()
                .map(|record| PendingRecord {
                    record,
                    skipped: false,
                })
                .collect(),
            cursor: 0,
            state,
        }
    }

    /// Loads the capture's diff records from the engine and starts reviewing.
    ///
    /// Fails while the capture is still in progress; the capture must be
    /// marked complete first.
    pub fn begin(capture_id: Uuid, engine: Arc<dyn SpecEngine>) -> Result<Self, ReviewError> {
        let records = engine.diff_records(capture_id)?;
        Ok(Self::new(capture_id, engine, records))
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn capture_id(&self) -> Uuid {
        self.capture_id
    }

    /// The record under review, while reviewing.
    pub fn current(&self) -> Option<&DiffRecord> {
        match self.state {
            ReviewState::Reviewing => self.records.get(self.cursor).map(|p| &p.record),
            _ => None,
        }
    }

    /// The current interpretation as it should appear in `display` context.
    ///
    /// An interpretation whose context flags match neither the request nor
    /// the requested display context is suppressed rather than shown
    /// ambiguously.
    pub fn interpretation_for(&self, display: DisplayContext) -> Option<&Interpretation> {
        self.current()
            .and_then(|record| record.interpretation.as_ref())
            .filter(|interpretation| interpretation.context.applies_to(display))
    }

    /// Records not yet applied: everything still awaiting a decision plus
    /// everything skipped.
    pub fn pending_count(&self) -> usize {
        self.records.len()
    }

    /// Records the reviewer skipped (reviewed but not applied).
    pub fn skipped_count(&self) -> usize {
        self.records.iter().filter(|p| p.skipped).count()
    }

    /// Applies the current record's interpretation.
    ///
    /// Submits the interpretation's commands together with its added/changed
    /// id metadata; on success the record leaves the pending set and the
    /// review advances. An engine rejection surfaces without advancing the
    /// cursor, so the reviewer can retry or skip.
    pub fn apply(&mut self) -> Result<(), ReviewError> {
        if self.state != ReviewState::Reviewing {
            return Err(ReviewError::NotReviewing);
        }
        let interpretation = self.records[self.cursor]
            .record
            .interpretation
            .as_ref()
            .ok_or(ReviewError::NothingToApply)?;

        self.engine.apply_commands(
            &interpretation.commands,
            &interpretation.added_ids,
            &interpretation.changed_ids,
        )?;
        info!(
            "[{}] applied \"{}\" ({} added, {} changed)",
            self.capture_id,
            interpretation.action_title,
            interpretation.added_ids.len(),
            interpretation.changed_ids.len()
        );

        // The applied record leaves the pending set; the cursor now points
        // at what was the next record.
        self.records.remove(self.cursor);
        self.finish_if_exhausted();
        Ok(())
    }

    /// Skips the current record: no spec mutation, cursor advances, record
    /// retained in the pending set.
    pub fn skip(&mut self) -> Result<(), ReviewError> {
        if self.state != ReviewState::Reviewing {
            return Err(ReviewError::NotReviewing);
        }
        self.records[self.cursor].skipped = true;
        self.cursor += 1;
        self.finish_if_exhausted();
        Ok(())
    }

    /// Abandons the review: remaining records are dropped and the spec is
    /// not mutated further. Terminal.
    pub fn discard(&mut self) -> Result<(), ReviewError> {
        if self.state != ReviewState::Reviewing {
            return Err(ReviewError::NotReviewing);
        }
        info!(
            "[{}] review discarded with {} record(s) remaining",
            self.capture_id,
            self.records.len() - self.cursor
        );
        self.records.clear();
        self.cursor = 0;
        self.state = ReviewState::Discarded;
        Ok(())
    }

    fn finish_if_exhausted(&mut self) {
        if self.cursor >= self.records.len() {
            info!(
                "[{}] review finished ({} skipped)",
                self.capture_id,
                self.skipped_count()
            );
            self.state = ReviewState::Reviewed;
        }
    }
}
