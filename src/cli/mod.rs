//! Command-line interface
//!
//! Argument parsing and the handlers behind `trialkit run` and
//! `trialkit validate`.

pub mod args;
pub mod commands;
