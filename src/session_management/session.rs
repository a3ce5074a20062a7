use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session_management::SessionStatus;

/// One end-to-end capture run.
///
/// Created when the orchestrator starts and owned by it exclusively until
/// `run` returns; the id doubles as the capture identifier the sink and the
/// spec engine are keyed on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Base directory this session's capture is persisted under.
    pub base_dir: PathBuf,
    pub status: SessionStatus,
}

impl CaptureSession {
    pub fn new(id: Uuid, base_dir: PathBuf) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            base_dir,
            status: SessionStatus::Initializing,
        }
    }

    /// Whether the session has reached a terminal status.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Completed | SessionStatus::Aborted
        )
    }
}
