//! `trialkit` - Phase-sequencing engine for timed behavioural trials
//!
//! A trial is a fixed sequence of asynchronous phases (stimulus, response,
//! optional advice, feedback) that timestamps every step and accumulates a
//! flat data record. The library provides the engine, the two standard
//! trial variants, and scripted collaborators for simulation and testing.

pub mod cli;
pub mod clock;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod observability;
pub mod phase;
pub mod record;
pub mod sim;
pub mod trial;
