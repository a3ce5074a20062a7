use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};

use super::types::{CaptureFlags, Protocol, ServiceEndpoint};
use crate::error_handling::types::ConfigError;

fn default_proxy_host() -> String {
    "127.0.0.1".to_string()
}

fn default_service_host() -> String {
    "127.0.0.1".to_string()
}

fn default_protocol() -> Protocol {
    Protocol::Http
}

fn default_capture_dir() -> PathBuf {
    PathBuf::from("captures")
}

fn default_true() -> bool {
    true
}

/// Complete configuration for one capture session.
///
/// Every recognized option is enumerated here with a documented default; the
/// record is validated once at startup and immutable afterwards. It can be
/// loaded either from a TOML file or from command-line arguments.
///
/// # Fields Overview
///
/// - `command`: optional service command supervised for the session's lifetime
/// - `proxy_host` / `proxy_port`: where the capturing proxy listens
/// - `service_host` / `service_port` / `service_protocol`: where the real
///   service listens (the forward target)
/// - `capture_dir`: base directory interactions are persisted under
/// - `transparent`: resolve the destination per-request instead of forwarding
///   to the fixed target
/// - `include_text_body` / `include_json_body` / `include_shape_hash`:
///   capture depth flags
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "apiwatch")]
pub struct SessionConfig {
    /// Command that starts the service-under-test.
    ///
    /// When present it is spawned through the platform shell with the service
    /// host/port injected into its environment, and its exit ends the
    /// session. When absent the session only ends on user interrupt.
    ///
    /// # Command Line
    /// Use `--command <CMD>` to set this value from the CLI
    #[arg(long)]
    #[serde(default)]
    pub command: Option<String>,

    /// Address the capturing proxy binds to.
    ///
    /// Clients of the service-under-test must be pointed here for their
    /// traffic to be observed.
    ///
    /// # Command Line
    /// Use `--proxy-host <HOST>` to set this value from the CLI
    #[arg(long, default_value = "127.0.0.1")]
    #[serde(default = "default_proxy_host")]
    pub proxy_host: String,

    /// Port the capturing proxy listens on.
    ///
    /// # Command Line
    /// Use `--proxy-port <PORT>` to set this value from the CLI
    #[arg(long)]
    pub proxy_port: u16,

    /// Host the real service listens on.
    ///
    /// # Command Line
    /// Use `--service-host <HOST>` to set this value from the CLI
    #[arg(long, default_value = "127.0.0.1")]
    #[serde(default = "default_service_host")]
    pub service_host: String,

    /// Port the real service listens on.
    ///
    /// The same value is injected into the supervised command's environment
    /// so the service binds where the proxy forwards.
    ///
    /// # Command Line
    /// Use `--service-port <PORT>` to set this value from the CLI
    #[arg(long)]
    pub service_port: u16,

    /// Protocol used to reach the service (`http` or `https`).
    ///
    /// # Command Line
    /// Use `--service-protocol <PROTO>` to set this value from the CLI
    #[arg(long, value_enum, default_value = "http")]
    #[serde(default = "default_protocol")]
    pub service_protocol: Protocol,

    /// Base directory captures are stored under.
    ///
    /// Each capture gets its own subdirectory named by its identifier.
    ///
    /// # Command Line
    /// Use `--capture-dir <PATH>` to set this value from the CLI
    #[arg(long, default_value = "captures")]
    #[serde(default = "default_capture_dir")]
    pub capture_dir: PathBuf,

    /// Transparent proxying mode.
    ///
    /// When enabled the forward destination is taken from each intercepted
    /// request instead of being fixed to the configured service endpoint.
    ///
    /// # Command Line
    /// Use `--transparent` flag to enable. Presence enables the feature
    #[arg(long, action = clap::ArgAction::SetTrue)]
    #[serde(default)]
    pub transparent: bool,

    /// Record raw body text for each interaction.
    ///
    /// # Command Line
    /// Use `--include-text-body <BOOL>` to set this value from the CLI
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    #[serde(default = "default_true")]
    pub include_text_body: bool,

    /// Record parsed JSON values for JSON bodies.
    ///
    /// # Command Line
    /// Use `--include-json-body <BOOL>` to set this value from the CLI
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    #[serde(default = "default_true")]
    pub include_json_body: bool,

    /// Record a structural shape hash for JSON bodies.
    ///
    /// # Command Line
    /// Use `--include-shape-hash <BOOL>` to set this value from the CLI
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    #[serde(default = "default_true")]
    pub include_shape_hash: bool,
}

impl SessionConfig {
    /// Loads and validates a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: SessionConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parses and validates a configuration from command-line arguments.
    pub fn from_args() -> Result<Self, ConfigError> {
        let config = SessionConfig::parse();
        config.validate()?;
        Ok(config)
    }

    /// The endpoint clients connect to.
    pub fn proxy_endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::new(self.proxy_host.clone(), self.proxy_port, Protocol::Http)
    }

    /// The endpoint the real service listens on.
    pub fn service_endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::new(
            self.service_host.clone(),
            self.service_port,
            self.service_protocol,
        )
    }

    pub fn capture_flags(&self) -> CaptureFlags {
        CaptureFlags {
            include_text_body: self.include_text_body,
            include_json_body: self.include_json_body,
            include_shape_hash: self.include_shape_hash,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy_host.trim().is_empty() {
            return Err(ConfigError::EmptyHost("proxy_host is empty".to_string()));
        }
        if self.service_host.trim().is_empty() {
            return Err(ConfigError::EmptyHost("service_host is empty".to_string()));
        }
        if self.proxy_port == 0 {
            return Err(ConfigError::BadPort("proxy_port must be non-zero".to_string()));
        }
        if self.service_port == 0 {
            return Err(ConfigError::BadPort(
                "service_port must be non-zero".to_string(),
            ));
        }
        if !self.transparent
            && self.proxy_host == self.service_host
            && self.proxy_port == self.service_port
        {
            return Err(ConfigError::BadPort(
                "proxy and service endpoints must differ".to_string(),
            ));
        }
        if let Some(parent) = self.capture_dir.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::BaseDirUnavailable(format!(
                    "parent of {} does not exist",
                    self.capture_dir.display()
                )));
            }
        }
        Ok(())
    }
}
