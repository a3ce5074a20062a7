//! Supervision of the service-under-test command.
//!
//! One [`CommandSession`] manages at most one child process. `start` spawns
//! the configured command line through the platform shell and hands back the
//! stopped-event channel; a watcher task owns the child from then on and
//! reports its terminal state exactly once, whether it exited on its own or
//! was stopped on request. `stop` is idempotent and leaves no orphans: a
//! graceful termination request escalates to a forcible kill after a bounded
//! grace period.

use std::process::Stdio;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::types::{ExitState, ProcessConfig};
use crate::error_handling::types::ProcessError;

/// How long a graceful stop waits before escalating to a forcible kill.
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

pub struct CommandSession {
    stop_tx: Option<watch::Sender<bool>>,
    watcher: Option<JoinHandle<()>>,
    started: bool,
}

impl CommandSession {
    pub fn new() -> Self {
        Self {
            stop_tx: None,
            watcher: None,
            started: false,
        }
    }

    /// Spawns the configured command and returns the stopped-event channel.
    ///
    /// Exactly one [`ExitState`] is delivered on the returned receiver per
    /// `start` call. The child inherits the caller's environment merged with
    /// the injected variables; injected values win on collision.
    pub fn start(
        &mut self,
        config: ProcessConfig,
    ) -> Result<mpsc::Receiver<ExitState>, ProcessError> {
        if self.started {
            return Err(ProcessError::AlreadyStarted);
        }

        let mut command = shell_command(&config.command);
        command
            .envs(config.environment_variables.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let child = command.spawn().map_err(ProcessError::SpawnFailed)?;
        info!(
            "started command `{}` (pid {:?})",
            config.command,
            child.id()
        );

        let (stopped_tx, stopped_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        self.stop_tx = Some(stop_tx);
        self.watcher = Some(tokio::spawn(watch_process(child, stop_rx, stopped_tx)));
        self.started = true;
        Ok(stopped_rx)
    }

    /// Requests the child to stop and waits for the watcher to finish.
    ///
    /// Idempotent: calling it on a never-started or already-stopped session
    /// is a no-op, and no second stopped event is ever produced.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(watcher) = self.watcher.take() {
            if let Err(e) = watcher.await {
                warn!("command watcher task failed: {}", e);
            }
        }
    }
}

impl Default for CommandSession {
    fn default() -> Self {
        Self::new()
    }
}

fn shell_command(command_line: &str) -> Command {
    #[cfg(unix)]
    {
        let mut command = Command::new("sh");
        command.arg("-c").arg(command_line);
        command
    }
    #[cfg(windows)]
    {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(command_line);
        command
    }
}

async fn watch_process(
    mut child: Child,
    mut stop_rx: watch::Receiver<bool>,
    stopped_tx: mpsc::Sender<ExitState>,
) {
    let exit_state = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => exit_state_of(status),
            Err(e) => {
                warn!("waiting on command failed: {}", e);
                ExitState::Killed
            }
        },
        _ = stop_rx.changed() => terminate(&mut child).await,
    };

    info!("command session stopped ({:?})", exit_state);
    if stopped_tx.send(exit_state).await.is_err() {
        debug!("stopped event had no listener");
    }
}

/// Graceful-then-forcible termination. The child gets a termination signal
/// and a grace period to exit before being killed outright.
async fn terminate(child: &mut Child) -> ExitState {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        debug!("sending SIGTERM to pid {}", pid);
        let _ = std::process::Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .status();
        if let Ok(Ok(_)) = tokio::time::timeout(STOP_GRACE_PERIOD, child.wait()).await {
            return ExitState::Killed;
        }
        warn!("pid {} ignored SIGTERM; killing", pid);
    }

    if let Err(e) = child.kill().await {
        warn!("kill failed: {}", e);
    }
    ExitState::Killed
}

fn exit_state_of(status: std::process::ExitStatus) -> ExitState {
    if let Some(code) = status.code() {
        return ExitState::Exited { code };
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitState::Signaled { signal };
        }
    }
    ExitState::Killed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_session::types::{SERVICE_HOST_ENV, SERVICE_PORT_ENV};
    use serial_test::serial;

    #[tokio::test]
    async fn reports_normal_exit_code() {
        let mut session = CommandSession::new();
        let mut stopped_rx = session
            .start(ProcessConfig {
                command: "exit 7".to_string(),
                environment_variables: Vec::new(),
            })
            .unwrap();

        let state = stopped_rx.recv().await.unwrap();
        assert_eq!(state, ExitState::Exited { code: 7 });
        // Channel closes after the single event.
        assert!(stopped_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn stop_twice_yields_one_stopped_event() {
        let mut session = CommandSession::new();
        let mut stopped_rx = session
            .start(ProcessConfig {
                command: "sleep 30".to_string(),
                environment_variables: Vec::new(),
            })
            .unwrap();

        session.stop().await;
        session.stop().await;

        let mut events = Vec::new();
        while let Some(state) = stopped_rx.recv().await {
            events.push(state);
        }
        assert_eq!(events, vec![ExitState::Killed]);
    }

    #[tokio::test]
    async fn stop_after_natural_exit_is_noop() {
        let mut session = CommandSession::new();
        let mut stopped_rx = session
            .start(ProcessConfig {
                command: "true".to_string(),
                environment_variables: Vec::new(),
            })
            .unwrap();

        let state = stopped_rx.recv().await.unwrap();
        assert_eq!(state, ExitState::Exited { code: 0 });

        session.stop().await;
        assert!(stopped_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn never_started_session_is_inert() {
        let mut session = CommandSession::new();
        session.stop().await;
        session.stop().await;
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let mut session = CommandSession::new();
        let _rx = session
            .start(ProcessConfig {
                command: "sleep 30".to_string(),
                environment_variables: Vec::new(),
            })
            .unwrap();
        let second = session.start(ProcessConfig {
            command: "true".to_string(),
            environment_variables: Vec::new(),
        });
        assert!(matches!(second, Err(ProcessError::AlreadyStarted)));
        session.stop().await;
    }

    #[tokio::test]
    #[serial]
    async fn injected_environment_wins_over_ambient() {
        // Pollute the ambient environment to prove override-wins.
        std::env::set_var(SERVICE_PORT_ENV, "1");

        let out = tempfile::NamedTempFile::new().unwrap();
        let out_path = out.path().to_path_buf();
        let mut session = CommandSession::new();
        let mut stopped_rx = session
            .start(ProcessConfig {
                command: format!(
                    "echo \"${}:${}\" > {}",
                    SERVICE_HOST_ENV,
                    SERVICE_PORT_ENV,
                    out_path.display()
                ),
                environment_variables: vec![
                    (SERVICE_HOST_ENV.to_string(), "127.0.0.1".to_string()),
                    (SERVICE_PORT_ENV.to_string(), "4001".to_string()),
                ],
            })
            .unwrap();

        let state = stopped_rx.recv().await.unwrap();
        assert_eq!(state, ExitState::Exited { code: 0 });

        let written = std::fs::read_to_string(&out_path).unwrap();
        assert_eq!(written.trim(), "127.0.0.1:4001");
        std::env::remove_var(SERVICE_PORT_ENV);
    }
}
