//! Phase engine
//!
//! Runs a trial as a strictly linear sequence of asynchronous phases. The
//! engine is generic over the state it drives: what a trial variant does is
//! entirely described by a [`Behavior`] value (ordered phase list, one
//! operation per phase, prompt expansion rule), so new variants are new
//! behaviour values rather than new engine code.
//!
//! # Architecture
//!
//! - [`PhaseName`]: Identifier of every phase a behaviour may list
//! - [`Behavior`]: Ordered phase list + per-phase operation table
//! - [`PromptMap`]: Total phase → prompt mapping, built once per trial
//! - [`PhaseSequencer`]: Executes a behaviour against a [`PhaseHost`]

pub mod behavior;
pub mod name;
pub mod prompt;
pub mod sequencer;

pub use behavior::{Behavior, BehaviorBuilder, PhaseFuture, PhaseOp, PhaseStep};
pub use name::PhaseName;
pub use prompt::{PromptMap, PromptRule};
pub use sequencer::{CallbackObserver, PhaseHost, PhaseObserver, PhaseSequencer, RunSummary};
