use std::fmt;

use crate::proxy::port_check::PortBlocker;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    EmptyHost(String),
    BadPort(String),
    BaseDirUnavailable(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::EmptyHost(e) => write!(f, "Host configuration error: {}", e),
            ConfigError::BadPort(e) => write!(f, "Port configuration error: {}", e),
            ConfigError::BaseDirUnavailable(e) => write!(f, "Capture directory error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum ProxyError {
    BindError(std::io::Error),
    AlreadyRunning,
    ExchangeError(std::io::Error),
    MalformedExchange(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::BindError(e) => write!(f, "Proxy bind error: {}", e),
            ProxyError::AlreadyRunning => write!(f, "Proxy is already running"),
            ProxyError::ExchangeError(e) => write!(f, "Proxy exchange error: {}", e),
            ProxyError::MalformedExchange(e) => write!(f, "Malformed HTTP exchange: {}", e),
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::ExchangeError(err)
    }
}

#[derive(Debug)]
pub enum ProcessError {
    SpawnFailed(std::io::Error),
    AlreadyStarted,
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::SpawnFailed(e) => write!(f, "Command spawn failed: {}", e),
            ProcessError::AlreadyStarted => write!(f, "Command session already started"),
        }
    }
}

impl std::error::Error for ProcessError {}

#[derive(Debug)]
pub enum SinkError {
    InitFailed(String),
    WriteFailed(String),
    Fatal(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::InitFailed(e) => write!(f, "Capture sink init failed: {}", e),
            SinkError::WriteFailed(e) => write!(f, "Capture sink write failed: {}", e),
            SinkError::Fatal(e) => write!(f, "Capture sink fatal failure: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

#[derive(Debug)]
pub enum SessionError {
    ProxyError(ProxyError),
    ProcessError(ProcessError),
    SinkError(SinkError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::ProxyError(e) => write!(f, "Proxy error: {}", e),
            SessionError::ProcessError(e) => write!(f, "Process error: {}", e),
            SessionError::SinkError(e) => write!(f, "Sink error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ProxyError> for SessionError {
    fn from(err: ProxyError) -> Self {
        SessionError::ProxyError(err)
    }
}

impl From<ProcessError> for SessionError {
    fn from(err: ProcessError) -> Self {
        SessionError::ProcessError(err)
    }
}

impl From<SinkError> for SessionError {
    fn from(err: SinkError) -> Self {
        SessionError::SinkError(err)
    }
}

#[derive(Debug)]
pub enum EngineError {
    CommandRejected(String),
    UnknownCapture(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::CommandRejected(e) => write!(f, "Spec command rejected: {}", e),
            EngineError::UnknownCapture(e) => write!(f, "Unknown capture: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

#[derive(Debug)]
pub enum ReviewError {
    NotReviewing,
    NothingToApply,
    EngineError(EngineError),
}

impl fmt::Display for ReviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewError::NotReviewing => write!(f, "Review session is not active"),
            ReviewError::NothingToApply => {
                write!(f, "Current diff record carries no interpretation")
            }
            ReviewError::EngineError(e) => write!(f, "Spec engine error: {}", e),
        }
    }
}

impl std::error::Error for ReviewError {}

impl From<EngineError> for ReviewError {
    fn from(err: EngineError) -> Self {
        ReviewError::EngineError(err)
    }
}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    PortUnavailable { port: u16, blockers: Vec<PortBlocker> },
    SessionError(SessionError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::PortUnavailable { port, blockers } => {
                writeln!(
                    f,
                    "Could not start the capture proxy on port {}. There is something else running:",
                    port
                )?;
                for b in blockers {
                    writeln!(f, "[pid {}]: {}", b.pid, b.command)?;
                }
                Ok(())
            }
            ControllerError::SessionError(e) => write!(f, "Session error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<SessionError> for ControllerError {
    fn from(err: SessionError) -> Self {
        ControllerError::SessionError(err)
    }
}
