//! Diff review subsystem.
//!
//! Once a capture is complete, the spec engine pairs each observed
//! interaction with zero-or-one interpretation (a proposed spec change).
//! The review machine here walks those records one at a time and exposes
//! the apply/skip/discard transitions a presentation layer drives.

pub mod review_machine;
pub mod types;

pub use review_machine::{DiffReview, ReviewState};
pub use types::{DiffRecord, DisplayContext, Interpretation, InterpretationContext, SpecCommand};
