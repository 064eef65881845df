//! Configuration module
//!
//! Loads and validates session files: the trial variant, the per-trial
//! configuration, and the scripted collaborators used by simulated runs.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoaderOptions};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
