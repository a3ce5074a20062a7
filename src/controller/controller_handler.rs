//! Task runner around one capture session.
//!
//! The [`Controller`] owns everything the orchestrator does not: it
//! pre-checks the proxy port (failing fast with the list of blocking
//! processes), mints the capture identifier, builds the capture saver wired
//! to the spec engine, runs the session, marks the capture complete, and
//! reduces the engine's summary to the operator-facing outcome.

use std::sync::Arc;

use log::{info, warn};
use uuid::Uuid;

use crate::capture::file_saver::FileCaptureSaver;
use crate::capture::saver_with_diffs::CaptureSaverWithDiffs;
use crate::capture::sink_trait::CaptureSink;
use crate::capture::types::CaptureStatus;
use crate::configuration::config::SessionConfig;
use crate::error_handling::types::{ControllerError, SessionError};
use crate::proxy::port_check::{find_port_blockers, port_is_free};
use crate::session_management::session::CaptureSession;
use crate::session_management::session_manager::SessionManager;
use crate::spec_engine::SpecEngine;

/// What one finished run amounts to.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub session: CaptureSession,
    pub status: CaptureStatus,
}

impl RunOutcome {
    /// Operator-facing summary line.
    pub fn summary(&self) -> String {
        if self.status.diffs_count > 0 {
            format!(
                "Observed unexpected API behavior. Review capture {} ({} diff(s) across {} interaction(s))",
                self.session.id, self.status.diffs_count, self.status.interactions_count
            )
        } else if self.status.interactions_count > 0 {
            format!(
                "No API diff observed for {} interaction(s)",
                self.status.interactions_count
            )
        } else {
            "No traffic observed".to_string()
        }
    }
}

pub struct Controller {
    config: SessionConfig,
    engine: Arc<dyn SpecEngine>,
}

impl Controller {
    pub fn new(config: SessionConfig, engine: Arc<dyn SpecEngine>) -> Self {
        Self { config, engine }
    }

    /// Runs one capture session end to end.
    ///
    /// Fails with [`ControllerError::PortUnavailable`] before anything is
    /// started or persisted when the proxy port is taken; on success the
    /// capture is marked complete and the engine's summary is folded into
    /// the returned outcome.
    pub async fn run(&self) -> Result<RunOutcome, ControllerError> {
        self.check_proxy_port()?;

        let capture_id = Uuid::new_v4();
        let sink = Arc::new(CaptureSaverWithDiffs::new(
            FileCaptureSaver::new(&self.config.capture_dir),
            Arc::clone(&self.engine),
            capture_id,
        ));
        self.run_session(capture_id, sink).await
    }

    /// Pre-flight: the intended proxy port must be free. Finding the
    /// processes that hold it gives the operator something actionable; the
    /// test bind catches holders the discovery tools cannot see.
    fn check_proxy_port(&self) -> Result<(), ControllerError> {
        let port = self.config.proxy_port;
        let blockers = find_port_blockers(port);
        if !blockers.is_empty() {
            return Err(ControllerError::PortUnavailable { port, blockers });
        }
        if !port_is_free(&self.config.proxy_host, port) {
            return Err(ControllerError::PortUnavailable {
                port,
                blockers: Vec::new(),
            });
        }
        Ok(())
    }

    async fn run_session(
        &self,
        capture_id: Uuid,
        sink: Arc<dyn CaptureSink>,
    ) -> Result<RunOutcome, ControllerError> {
        let manager = SessionManager::new(self.config.clone());
        let session = manager.run(capture_id, Arc::clone(&sink)).await?;

        if let Err(e) = self.engine.mark_capture_completed(capture_id) {
            // The durable capture is intact; only the diff summary is lost.
            warn!("[{}] could not mark capture completed: {}", capture_id, e);
        }
        let status = sink.status(capture_id).map_err(SessionError::from)?;

        let outcome = RunOutcome { session, status };
        info!("[{}] {}", capture_id, outcome.summary());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::Interaction;
    use crate::configuration::types::Protocol;
    use crate::error_handling::types::SinkError;
    use crate::spec_engine::InMemorySpecEngine;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    struct UntouchableSink {
        init_calls: AtomicUsize,
    }

    impl CaptureSink for UntouchableSink {
        fn init(&self, _capture_id: Uuid) -> Result<(), SinkError> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn save(&self, _interaction: Interaction) {}
        fn close(&self) -> Result<(), SinkError> {
            Ok(())
        }
        fn status(&self, _capture_id: Uuid) -> Result<CaptureStatus, SinkError> {
            Ok(CaptureStatus {
                interactions_count: 0,
                diffs_count: 0,
            })
        }
    }

    fn test_config(proxy_port: u16) -> SessionConfig {
        SessionConfig {
            command: None,
            proxy_host: "127.0.0.1".to_string(),
            proxy_port,
            service_host: "127.0.0.1".to_string(),
            service_port: 1,
            service_protocol: Protocol::Http,
            capture_dir: PathBuf::from("captures"),
            transparent: false,
            include_text_body: true,
            include_json_body: true,
            include_shape_hash: true,
        }
    }

    #[tokio::test]
    async fn occupied_port_fails_before_the_sink_is_touched() {
        let occupied = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = occupied.local_addr().unwrap().port();

        let controller = Controller::new(
            test_config(port),
            Arc::new(InMemorySpecEngine::new()),
        );

        // The pre-check must reject the run on its own; the sink and the
        // proxy are never reached.
        let sink = Arc::new(UntouchableSink {
            init_calls: AtomicUsize::new(0),
        });
        let result = match controller.check_proxy_port() {
            Err(e) => Err(e),
            Ok(()) => controller.run_session(Uuid::new_v4(), sink.clone()).await,
        };

        assert!(matches!(
            result,
            Err(ControllerError::PortUnavailable { .. })
        ));
        assert_eq!(sink.init_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn port_unavailable_error_lists_the_port() {
        let occupied = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = occupied.local_addr().unwrap().port();

        let controller = Controller::new(
            test_config(port),
            Arc::new(InMemorySpecEngine::new()),
        );
        let err = controller.run().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&port.to_string()), "message: {}", message);
    }

    #[test]
    fn summary_reports_diffs_over_interactions() {
        let session = CaptureSession::new(Uuid::new_v4(), PathBuf::from("captures"));
        let with_diffs = RunOutcome {
            session: session.clone(),
            status: CaptureStatus {
                interactions_count: 5,
                diffs_count: 2,
            },
        };
        assert!(with_diffs.summary().contains("unexpected API behavior"));

        let clean = RunOutcome {
            session: session.clone(),
            status: CaptureStatus {
                interactions_count: 5,
                diffs_count: 0,
            },
        };
        assert_eq!(clean.summary(), "No API diff observed for 5 interaction(s)");

        let silent = RunOutcome {
            session,
            status: CaptureStatus {
                interactions_count: 0,
                diffs_count: 0,
            },
        };
        assert_eq!(silent.summary(), "No traffic observed");
    }
}
