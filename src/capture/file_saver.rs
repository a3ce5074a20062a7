use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::{debug, error, info, trace};
use uuid::Uuid;

use crate::capture::sink_trait::CaptureSink;
use crate::capture::types::{CaptureStatus, Interaction};
use crate::error_handling::types::SinkError;

/// Consecutive write failures tolerated before the saver flags itself fatal.
const FATAL_FAILURE_STREAK: u32 = 3;

/// Filesystem-backed capture saver.
///
/// `init` creates `<base>/<capture_id>/` and opens `interactions.jsonl`
/// inside it; every `save` appends one JSON line under an internal lock, so
/// concurrent exchange tasks never interleave records. Write failures are
/// logged and retained on the error channel; a streak of failures flags the
/// saver fatal, which the orchestrator turns into an aborted session.
pub struct FileCaptureSaver {
    base_dir: PathBuf,
    state: Mutex<Option<OpenCapture>>,
    last_error: Mutex<Option<SinkError>>,
    fatal: AtomicBool,
}

struct OpenCapture {
    capture_id: Uuid,
    log: Option<File>,
    interactions_count: u64,
    failure_streak: u32,
}

impl FileCaptureSaver {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            state: Mutex::new(None),
            last_error: Mutex::new(None),
            fatal: AtomicBool::new(false),
        }
    }

    /// Directory everything for `capture_id` lives under.
    pub fn capture_dir(&self, capture_id: Uuid) -> PathBuf {
        self.base_dir.join(capture_id.to_string())
    }

    fn interactions_path(&self, capture_id: Uuid) -> PathBuf {
        self.capture_dir(capture_id).join("interactions.jsonl")
    }

    fn record_failure(&self, capture: &mut OpenCapture, error: SinkError) {
        capture.failure_streak += 1;
        if capture.failure_streak >= FATAL_FAILURE_STREAK {
            error!(
                "[{}] {} consecutive write failures; flagging capture sink fatal",
                capture.capture_id, capture.failure_streak
            );
            self.fatal.store(true, Ordering::SeqCst);
        }
        *self.last_error.lock().unwrap() = Some(error);
    }
}

impl CaptureSink for FileCaptureSaver {
    fn init(&self, capture_id: Uuid) -> Result<(), SinkError> {
        let dir = self.capture_dir(capture_id);
        fs::create_dir_all(&dir).map_err(|e| {
            error!("Failed to create capture dir {}: {}", dir.display(), e);
            SinkError::InitFailed(format!("create {}: {}", dir.display(), e))
        })?;

        let path = self.interactions_path(capture_id);
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                error!("Failed to open interaction log {}: {}", path.display(), e);
                SinkError::InitFailed(format!("open {}: {}", path.display(), e))
            })?;

        info!("[{}] capture saver initialized at {}", capture_id, dir.display());
        *self.state.lock().unwrap() = Some(OpenCapture {
            capture_id,
            log: Some(log),
            interactions_count: 0,
            failure_streak: 0,
        });
        Ok(())
    }

    fn save(&self, interaction: Interaction) {
        let mut state = self.state.lock().unwrap();
        let capture = state
            .as_mut()
            .expect("CaptureSink::save called before init");

        trace!(
            "[{}] saving sample {} {} {}",
            capture.capture_id,
            interaction.sample_id,
            interaction.request.method,
            interaction.request.path
        );

        let line = match serde_json::to_string(&interaction) {
            Ok(line) => line,
            Err(e) => {
                error!(
                    "[{}] failed to serialize sample {}: {}",
                    capture.capture_id, interaction.sample_id, e
                );
                self.record_failure(capture, SinkError::WriteFailed(e.to_string()));
                return;
            }
        };

        let log = match capture.log.as_mut() {
            Some(log) => log,
            None => {
                error!("[{}] save after close; sample retained on error channel", capture.capture_id);
                self.record_failure(
                    capture,
                    SinkError::WriteFailed("interaction log already closed".to_string()),
                );
                return;
            }
        };

        match writeln!(log, "{}", line) {
            Ok(()) => {
                capture.interactions_count += 1;
                capture.failure_streak = 0;
            }
            Err(e) => {
                error!(
                    "[{}] failed to append sample {}: {}",
                    capture.capture_id, interaction.sample_id, e
                );
                self.record_failure(capture, SinkError::WriteFailed(e.to_string()));
            }
        }
    }

    fn close(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        let capture = match state.as_mut() {
            Some(capture) => capture,
            None => return Ok(()),
        };
        if let Some(log) = capture.log.take() {
            log.sync_all().map_err(|e| {
                error!("[{}] failed to sync interaction log: {}", capture.capture_id, e);
                SinkError::Fatal(e.to_string())
            })?;
            debug!(
                "[{}] interaction log closed after {} sample(s)",
                capture.capture_id, capture.interactions_count
            );
        }
        Ok(())
    }

    fn status(&self, capture_id: Uuid) -> Result<CaptureStatus, SinkError> {
        let state = self.state.lock().unwrap();
        match state.as_ref() {
            Some(capture) if capture.capture_id == capture_id => Ok(CaptureStatus {
                interactions_count: capture.interactions_count,
                diffs_count: 0,
            }),
            _ => Err(SinkError::WriteFailed(format!(
                "unknown capture {}",
                capture_id
            ))),
        }
    }

    fn take_error(&self) -> Option<SinkError> {
        self.last_error.lock().unwrap().take()
    }

    fn has_fatal_error(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::{CapturedRequest, CapturedResponse};
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
    fn saves_one_json_line_per_interaction() {
        let dir = TempDir::new().unwrap();
        let saver = FileCaptureSaver::new(dir.path());
        let capture_id = Uuid::new_v4();

        saver.init(capture_id).unwrap();
        saver.save(sample("/a"));
        saver.save(sample("/b"));
        saver.close().unwrap();

        let raw =
            fs::read_to_string(dir.path().join(capture_id.to_string()).join("interactions.jsonl"))
                .unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Interaction = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.request.path, "/a");
        let second: Interaction = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.request.path, "/b");
    }

    #[test]
    fn status_counts_saved_interactions() {
        let dir = TempDir::new().unwrap();
        let saver = FileCaptureSaver::new(dir.path());
        let capture_id = Uuid::new_v4();

        saver.init(capture_id).unwrap();
        for i in 0..3 {
            saver.save(sample(&format!("/{}", i)));
        }

        let status = saver.status(capture_id).unwrap();
        assert_eq!(status.interactions_count, 3);
        assert_eq!(status.diffs_count, 0);
        assert!(saver.take_error().is_none());
        assert!(!saver.has_fatal_error());
    }

    #[test]
    fn status_for_unknown_capture_is_an_error() {
        let dir = TempDir::new().unwrap();
        let saver = FileCaptureSaver::new(dir.path());
        saver.init(Uuid::new_v4()).unwrap();
        assert!(saver.status(Uuid::new_v4()).is_err());
    }

    #[test]
    #[should_panic(expected = "save called before init")]
    fn save_before_init_panics() {
        let dir = TempDir::new().unwrap();
        let saver = FileCaptureSaver::new(dir.path());
        saver.save(sample("/early"));
    }

    #[test]
    fn init_fails_when_base_dir_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocking_file = dir.path().join("base");
        fs::write(&blocking_file, b"not a directory").unwrap();

        let saver = FileCaptureSaver::new(&blocking_file);
        let result = saver.init(Uuid::new_v4());
        assert!(matches!(result, Err(SinkError::InitFailed(_))));
    }

    #[test]
    fn write_failures_surface_on_error_channel_and_escalate() {
        let dir = TempDir::new().unwrap();
        let saver = FileCaptureSaver::new(dir.path());
        let capture_id = Uuid::new_v4();
        saver.init(capture_id).unwrap();
        saver.close().unwrap();

        // The log is closed; every save now fails.
        saver.save(sample("/x"));
        assert!(saver.take_error().is_some());
        assert!(!saver.has_fatal_error());

        saver.save(sample("/y"));
        saver.save(sample("/z"));
        assert!(saver.has_fatal_error());
    }
}
