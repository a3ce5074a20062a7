//! # Session Orchestrator
//!
//! Wires the capturing proxy, the supervised command, and the capture sink
//! into one session and drives its lifecycle:
//!
//! ```text
//!   sink.init ──▶ forwarder task ──▶ proxy.start ──▶ command.start
//!                                                        │
//!               ┌──── command stopped ◀──────────────────┘
//!   race on ────┼──── user interrupt
//!               └──── sink fatal failure
//!                        │
//!   command.stop ──▶ proxy.stop (drain) ──▶ forwarder ends ──▶ sink.close
//! ```
//!
//! The race is the orchestrator's only suspension point and is unbounded on
//! purpose: it waits for human or process action, not a deadline. First
//! resolution wins; slower participants are abandoned, and the shutdown
//! sequence is safe to reach from any of them because every stop operation
//! is idempotent.

use std::future::Future;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::capture::sink_trait::CaptureSink;
use crate::command_session::supervisor::CommandSession;
use crate::command_session::types::{ProcessConfig, SERVICE_HOST_ENV, SERVICE_PORT_ENV};
use crate::configuration::config::SessionConfig;
use crate::error_handling::types::SessionError;
use crate::proxy::controller::CapturingProxy;
use crate::proxy::types::ProxyConfig;
use crate::session_management::session::CaptureSession;
use crate::session_management::SessionStatus;

pub struct SessionManager {
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Runs one capture session to completion.
    ///
    /// Blocks until the supervised command exits or the user interrupts the
    /// process, then shuts down in order. The returned session carries the
    /// terminal status: `Completed` normally, `Aborted` when the sink hit a
    /// fatal storage failure mid-capture.
    pub async fn run(
        &self,
        capture_id: Uuid,
        sink: Arc<dyn CaptureSink>,
    ) -> Result<CaptureSession, SessionError> {
        self.run_with_shutdown(capture_id, sink, interrupt_signal()).await
    }

    /// Same as [`run`](Self::run) with the interrupt source supplied by the
    /// caller. The production path passes the process signal handler; tests
    /// pass a future they can resolve on demand.
    pub async fn run_with_shutdown<F>(
        &self,
        capture_id: Uuid,
        sink: Arc<dyn CaptureSink>,
        interrupt: F,
    ) -> Result<CaptureSession, SessionError>
    where
        F: Future<Output = ()> + Send,
    {
        let mut session = CaptureSession::new(capture_id, self.config.capture_dir.clone());
        info!("[{}] capture session created", session.id);

        sink.init(capture_id)?;

        // The forwarder is the channel's single consumer: every interaction
        // reaches the sink in arrival order. It ends when the proxy drops
        // the last sender on drain, or early when the sink goes fatal.
        let (sample_tx, mut sample_rx) = mpsc::unbounded_channel();
        let mut forwarder = tokio::spawn({
            let sink = Arc::clone(&sink);
            async move {
                while let Some(interaction) = sample_rx.recv().await {
                    sink.save(interaction);
                    if sink.has_fatal_error() {
                        error!("capture sink reported a fatal storage failure");
                        break;
                    }
                }
            }
        });

        let service = self.config.service_endpoint();
        let target = if self.config.transparent {
            None
        } else {
            Some(service.clone())
        };

        let mut proxy = CapturingProxy::new();
        let proxy_config = ProxyConfig {
            bind_host: self.config.proxy_host.clone(),
            bind_port: self.config.proxy_port,
            target,
            flags: self.config.capture_flags(),
        };
        if let Err(e) = proxy.start(proxy_config, sample_tx).await {
            // Nothing was captured; the forwarder ends as soon as the
            // channel sender dropped with the failed start.
            let _ = forwarder.await;
            let _ = sink.close();
            return Err(e.into());
        }

        let mut command_session = CommandSession::new();
        let mut stopped_rx = None;
        if let Some(command) = &self.config.command {
            info!(
                "[{}] running command `{}` with {}={} {}={}",
                session.id, command, SERVICE_HOST_ENV, service.host, SERVICE_PORT_ENV, service.port
            );
            let process_config = ProcessConfig {
                command: command.clone(),
                environment_variables: vec![
                    (SERVICE_HOST_ENV.to_string(), service.host.clone()),
                    (SERVICE_PORT_ENV.to_string(), service.port.to_string()),
                ],
            };
            match command_session.start(process_config) {
                Ok(rx) => stopped_rx = Some(rx),
                Err(e) => {
                    // The proxy is already listening; stop it cleanly
                    // before aborting the session.
                    proxy.stop().await;
                    let _ = forwarder.await;
                    let _ = sink.close();
                    return Err(e.into());
                }
            }
        }

        session.status = SessionStatus::Capturing;
        info!(
            "[{}] capturing on {}:{} (forwarding to {})",
            session.id,
            self.config.proxy_host,
            self.config.proxy_port,
            if self.config.transparent {
                "per-request destinations".to_string()
            } else {
                service.url()
            }
        );

        // The termination race. Exactly one branch runs the shutdown
        // sequence below; the branches it raced against are abandoned.
        let mut sink_failed = false;
        {
            let command_stopped = async {
                match stopped_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            };
            tokio::pin!(command_stopped);
            tokio::pin!(interrupt);
            tokio::select! {
                state = &mut command_stopped => {
                    info!("[{}] command stopped ({:?}); shutting down", session.id, state);
                }
                _ = &mut interrupt => {
                    info!("[{}] interrupt received; shutting down", session.id);
                }
                _ = &mut forwarder => {
                    sink_failed = true;
                    error!("[{}] aborting session on sink failure", session.id);
                }
            }
        }

        // Ordered shutdown: supervisor first (idempotent even if the
        // command already stopped on its own), then the proxy, which drains
        // in-flight exchanges and closes the channel after the last event.
        command_session.stop().await;
        proxy.stop().await;
        if !sink_failed {
            if let Err(e) = forwarder.await {
                warn!("[{}] sink forwarder task failed: {}", session.id, e);
            }
        }

        let close_failed = match sink.close() {
            Ok(()) => false,
            Err(e) => {
                error!("[{}] failed to close capture sink: {}", session.id, e);
                true
            }
        };

        session.status = if sink_failed || close_failed || sink.has_fatal_error() {
            SessionStatus::Aborted
        } else {
            SessionStatus::Completed
        };
        info!("[{}] session {:?}", session.id, session.status);
        Ok(session)
    }
}

/// Resolves on the first user interrupt (ctrl-c).
async fn interrupt_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // With no signal handler available the session can still end
        // through the supervised command.
        warn!("interrupt handler unavailable");
        std::future::pending::<()>().await;
    }
}
