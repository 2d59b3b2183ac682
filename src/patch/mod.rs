//! Content-to-source patching.
//!
//! `engine` applies individual edit instructions through the two-tier
//! oracle/fallback strategy; `diff` holds the pure review and pre-flight
//! validation utilities.

pub mod diff;
pub mod engine;

pub use diff::{content_diff, validate_replacement, ValidationResult};
pub use engine::PatchEngine;
