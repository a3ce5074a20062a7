use crate::configuration::types::{CaptureFlags, ServiceEndpoint};

/// Start-time configuration for the capturing proxy.
///
/// Everything the proxy needs is carried here explicitly, scoped to one
/// `start` call; nothing is read from process-global state.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address the listener binds to.
    pub bind_host: String,
    /// Port the listener binds to.
    pub bind_port: u16,
    /// Fixed forward target. `None` selects transparent mode, where the
    /// destination is resolved from each intercepted request.
    pub target: Option<ServiceEndpoint>,
    /// Capture depth for recorded bodies.
    pub flags: CaptureFlags,
}

impl ProxyConfig {
    pub fn bind_authority(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }
}
