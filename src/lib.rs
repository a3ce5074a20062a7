pub mod capture;
pub use capture::{CaptureSink, Interaction};

pub mod command_session;
pub use command_session::CommandSession;

pub mod configuration;
pub use configuration::SessionConfig;

pub mod controller;
pub use controller::Controller;

pub mod diff_review;
pub use diff_review::DiffReview;

pub mod error_handling;

pub mod proxy;
pub use proxy::CapturingProxy;

pub mod session_management;
pub use session_management::{CaptureSession, SessionManager, SessionStatus};

pub mod spec_engine;
pub use spec_engine::{InMemorySpecEngine, SpecEngine};
