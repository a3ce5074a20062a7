//! External spec/diff engine interface.
//!
//! The engine that reconciles observed traffic against the known API
//! specification is an external collaborator; this crate only defines the
//! narrow trait it is consumed through, plus an in-memory implementation
//! used as the default wiring and as a test double.

pub mod in_memory_engine;
pub mod spec_engine_trait;

pub use in_memory_engine::InMemorySpecEngine;
pub use spec_engine_trait::SpecEngine;
