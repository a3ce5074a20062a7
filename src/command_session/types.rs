use serde::{Deserialize, Serialize};

/// Environment variable carrying the service's listen host to the supervised
/// command. Part of the tool/service contract; never rename.
pub const SERVICE_HOST_ENV: &str = "APIWATCH_SERVICE_HOST";

/// Environment variable carrying the service's listen port to the supervised
/// command. Part of the tool/service contract; never rename.
pub const SERVICE_PORT_ENV: &str = "APIWATCH_SERVICE_PORT";

/// What to run and with which injected environment.
///
/// The child inherits the supervisor's environment; on key collision the
/// injected value wins.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub command: String,
    pub environment_variables: Vec<(String, String)>,
}

/// Terminal state of a supervised process, delivered exactly once per
/// `start` on the stopped-event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitState {
    /// Normal exit with the given code.
    Exited { code: i32 },
    /// Terminated by a signal the supervisor did not send.
    Signaled { signal: i32 },
    /// Stopped on the supervisor's request.
    Killed,
}
