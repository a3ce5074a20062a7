pub mod controller;
pub mod http;
pub mod port_check;
pub mod types;

pub use controller::CapturingProxy;
pub use port_check::{find_port_blockers, PortBlocker};
pub use types::ProxyConfig;
