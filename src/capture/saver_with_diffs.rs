use std::sync::Arc;

use log::warn;
use uuid::Uuid;

use crate::capture::file_saver::FileCaptureSaver;
use crate::capture::sink_trait::CaptureSink;
use crate::capture::types::{CaptureStatus, Interaction};
use crate::error_handling::types::SinkError;
use crate::spec_engine::SpecEngine;

/// Capture saver that also feeds the spec/diff engine.
///
/// Wraps a [`FileCaptureSaver`] so every interaction is durably recorded
/// first, then handed to the engine for diff computation. Engine failures
/// never block or fail the capture; the durable record is the source of
/// truth and the engine can re-ingest from it later.
pub struct CaptureSaverWithDiffs {
    inner: FileCaptureSaver,
    engine: Arc<dyn SpecEngine>,
    capture_id: Uuid,
}

impl CaptureSaverWithDiffs {
    pub fn new(inner: FileCaptureSaver, engine: Arc<dyn SpecEngine>, capture_id: Uuid) -> Self {
        Self {
            inner,
            engine,
            capture_id,
        }
    }
}

impl CaptureSink for CaptureSaverWithDiffs {
    fn init(&self, capture_id: Uuid) -> Result<(), SinkError> {
        self.inner.init(capture_id)
    }

    fn save(&self, interaction: Interaction) {
        if let Err(e) = self.engine.ingest(self.capture_id, &interaction) {
            warn!(
                "[{}] spec engine rejected sample {}: {}",
                self.capture_id, interaction.sample_id, e
            );
        }
        self.inner.save(interaction);
    }

    fn close(&self) -> Result<(), SinkError> {
        self.inner.close()
    }

    /// Interaction count comes from the durable record; the diff count comes
    /// from the engine.
    fn status(&self, capture_id: Uuid) -> Result<CaptureStatus, SinkError> {
        let saved = self.inner.status(capture_id)?;
        let diffs_count = match self.engine.capture_status(capture_id) {
            Ok(engine_status) => engine_status.diffs_count,
            Err(e) => {
                warn!("[{}] spec engine status unavailable: {}", capture_id, e);
                0
            }
        };
        Ok(CaptureStatus {
            interactions_count: saved.interactions_count,
            diffs_count,
        })
    }

    fn take_error(&self) -> Option<SinkError> {
        self.inner.take_error()
    }

    fn has_fatal_error(&self) -> bool {
        self.inner.has_fatal_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::{CapturedRequest, CapturedResponse};
    use crate::spec_engine::InMemorySpecEngine;
    use tempfile::TempDir;

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
    fn forwards_each_saved_interaction_to_the_engine() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(InMemorySpecEngine::new());
        let capture_id = Uuid::new_v4();
        let saver = CaptureSaverWithDiffs::new(
            FileCaptureSaver::new(dir.path()),
            engine.clone(),
            capture_id,
        );

        saver.init(capture_id).unwrap();
        saver.save(sample("/a"));
        saver.save(sample("/b"));
        saver.close().unwrap();

        let engine_status = engine.capture_status(capture_id).unwrap();
        assert_eq!(engine_status.interactions_count, 2);

        let status = saver.status(capture_id).unwrap();
        assert_eq!(status.interactions_count, 2);
    }
}
