//! Command session subsystem.
//!
//! Supervision of the service-under-test: spawning the configured command
//! with the service endpoint injected into its environment, watching its
//! lifecycle, and stopping it without leaving orphans.

pub mod supervisor;
pub mod types;

pub use supervisor::CommandSession;
pub use types::{ExitState, ProcessConfig, SERVICE_HOST_ENV, SERVICE_PORT_ENV};
