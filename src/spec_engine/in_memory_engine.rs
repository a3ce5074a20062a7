use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, info};
use uuid::Uuid;

use crate::capture::types::{CaptureStatus, Interaction};
use crate::diff_review::types::{DiffRecord, SpecCommand};
use crate::error_handling::types::EngineError;
use crate::spec_engine::spec_engine_trait::SpecEngine;

/// In-memory spec engine.
///
/// Holds no specification, so every observed interaction comes back as an
/// unexplained-traffic record with no interpretation. Serves as the default
/// wiring when no real engine is connected and as the test double for the
/// orchestrator and review machine.
pub struct InMemorySpecEngine {
    captures: Mutex<HashMap<Uuid, CaptureRecord>>,
    applied: Mutex<Vec<AppliedChange>>,
}

#[derive(Default)]
struct CaptureRecord {
    interactions: Vec<Interaction>,
    completed: bool,
}

/// One reviewer-approved command batch, kept for inspection.
#[derive(Debug, Clone)]
pub struct AppliedChange {
    pub commands: Vec<SpecCommand>,
    pub added_ids: Vec<String>,
    pub changed_ids: Vec<String>,
}

impl InMemorySpecEngine {
    pub fn new() -> Self {
        Self {
            captures: Mutex::new(HashMap::new()),
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Command batches applied so far, in application order.
    pub fn applied_changes(&self) -> Vec<AppliedChange> {
        self.applied.lock().unwrap().clone()
    }
}

impl Default for InMemorySpecEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecEngine for InMemorySpecEngine {
    fn ingest(&self, capture_id: Uuid, interaction: &Interaction) -> Result<(), EngineError> {
        let mut captures = self.captures.lock().unwrap();
        let record = captures.entry(capture_id).or_default();
        if record.completed {
            return Err(EngineError::CommandRejected(format!(
                "capture {} is already completed",
                capture_id
            )));
        }
        debug!(
            "[{}] engine ingested sample {} {}",
            capture_id, interaction.request.method, interaction.request.path
        );
        record.interactions.push(interaction.clone());
        Ok(())
    }

    fn mark_capture_completed(&self, capture_id: Uuid) -> Result<(), EngineError> {
        let mut captures = self.captures.lock().unwrap();
        let record = captures
            .get_mut(&capture_id)
            .ok_or_else(|| EngineError::UnknownCapture(capture_id.to_string()))?;
        record.completed = true;
        info!(
            "[{}] capture completed with {} interaction(s)",
            capture_id,
            record.interactions.len()
        );
        Ok(())
    }

    fn capture_status(&self, capture_id: Uuid) -> Result<CaptureStatus, EngineError> {
        let captures = self.captures.lock().unwrap();
        let record = captures
            .get(&capture_id)
            .ok_or_else(|| EngineError::UnknownCapture(capture_id.to_string()))?;
        Ok(CaptureStatus {
            interactions_count: record.interactions.len() as u64,
            diffs_count: 0,
        })
    }

    fn diff_records(&self, capture_id: Uuid) -> Result<Vec<DiffRecord>, EngineError> {
        let captures = self.captures.lock().unwrap();
        let record = captures
            .get(&capture_id)
            .ok_or_else(|| EngineError::UnknownCapture(capture_id.to_string()))?;
        if !record.completed {
            return Err(EngineError::CommandRejected(format!(
                "capture {} is still in progress",
                capture_id
            )));
        }
        // No spec to compare against: everything is unexplained traffic.
        Ok(record
            .interactions
            .iter()
            .map(|interaction| DiffRecord {
                interaction: interaction.clone(),
                interpretation: None,
            })
            .collect())
    }

    fn apply_commands(
        &self,
        commands: &[SpecCommand],
        added_ids: &[String],
        changed_ids: &[String],
    ) -> Result<(), EngineError> {
        if commands.is_empty() {
            return Err(EngineError::CommandRejected(
                "empty command batch".to_string(),
            ));
        }
        self.applied.lock().unwrap().push(AppliedChange {
            commands: commands.to_vec(),
            added_ids: added_ids.to_vec(),
            changed_ids: changed_ids.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::{CapturedRequest, CapturedResponse};

    fn sample(path: &str) -> Interaction {
        Interaction {
            sample_id: Uuid::new_v4(),
            request: CapturedRequest {
                method: "GET".to_string(),
                path: path.to_string(),
                query: None,
                headers: Vec::new(),
                body: None,
            },
            response: CapturedResponse {
                status_code: 200,
                headers: Vec::new(),
                body: None,
            },
            captured_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn diff_records_require_a_completed_capture() {
        let engine = InMemorySpecEngine::new();
        let capture_id = Uuid::new_v4();

        engine.ingest(capture_id, &sample("/a")).unwrap();
        assert!(engine.diff_records(capture_id).is_err());

        engine.mark_capture_completed(capture_id).unwrap();
        let records = engine.diff_records(capture_id).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].interpretation.is_none());
    }

    #[test]
    fn ingest_after_completion_is_rejected() {
        let engine = InMemorySpecEngine::new();
        let capture_id = Uuid::new_v4();

        engine.ingest(capture_id, &sample("/a")).unwrap();
        engine.mark_capture_completed(capture_id).unwrap();
        assert!(engine.ingest(capture_id, &sample("/b")).is_err());
    }

    #[test]
    fn unknown_capture_is_an_error() {
        let engine = InMemorySpecEngine::new();
        assert!(matches!(
            engine.capture_status(Uuid::new_v4()),
            Err(EngineError::UnknownCapture(_))
        ));
    }

    #[test]
    fn applied_commands_are_recorded() {
        let engine = InMemorySpecEngine::new();
        let command = SpecCommand {
            kind: "AddField".to_string(),
            payload: serde_json::json!({"name": "id"}),
        };
        engine
            .apply_commands(&[command], &["field_1".to_string()], &[])
            .unwrap();

        let applied = engine.applied_changes();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].added_ids, vec!["field_1".to_string()]);
    }
}
