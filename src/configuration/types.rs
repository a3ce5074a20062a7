use std::fmt;

use serde::{Deserialize, Serialize};

/// Application protocol spoken by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Http
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// One side of the capture topology: where something listens.
///
/// Two instances exist per session: the proxy-facing endpoint (where clients
/// connect) and the target endpoint (where the real service listens). Both
/// are immutable for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

impl ServiceEndpoint {
    pub fn new(host: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
        }
    }

    /// `host:port` form, used for socket addresses and Host headers.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Full URL form, used for operator-facing messages.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// Capture depth for proxied exchanges.
///
/// Flags are scoped to one proxy start; they are never read from
/// process-global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFlags {
    /// Record raw body text alongside each interaction.
    pub include_text_body: bool,
    /// Record the parsed JSON value for JSON bodies.
    pub include_json_body: bool,
    /// Record a structural shape hash of JSON bodies.
    pub include_shape_hash: bool,
}

impl Default for CaptureFlags {
    fn default() -> Self {
        Self {
            include_text_body: true,
            include_json_body: true,
            include_shape_hash: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_and_authority() {
        let ep = ServiceEndpoint::new("127.0.0.1", 4001, Protocol::Http);
        assert_eq!(ep.authority(), "127.0.0.1:4001");
        assert_eq!(ep.url(), "http://127.0.0.1:4001");
    }

    #[test]
    fn protocol_parses_from_lowercase() {
        let p: Protocol = serde_json::from_str("\"https\"").unwrap();
        assert_eq!(p, Protocol::Https);
    }
}
