//! Trials
//!
//! A [`Trial`] owns one configuration, its collaborators and the record it
//! produces. What happens during a run is decided by the [`Behavior`] it was
//! built with: [`base_behavior`] for the seven-phase trial, or
//! [`advised_behavior`] for the variant with advice and a final response.
//!
//! ```text
//! begin → showStim → hideStim → getResponse → showFeedback → end → cleanup
//!                                    │
//!                     advised:       └→ showAdvice → getFinalResponse ┐
//!                                                                     ↓
//!                                                               showFeedback
//! ```

mod advised;
mod phases;

use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::clock::{PhaseClock, TimeSource};
use crate::collaborator::{Collaborators, ResponseOutcome, TrialView};
use crate::config::schema::{PromptSpec, TrialConfig, Variant};
use crate::error::{ConfigError, PhaseError, TrialKitError};
use crate::observability::metrics;
use crate::phase::{Behavior, PhaseHost, PhaseName, PhaseObserver, PhaseSequencer, PromptMap, RunSummary};
use crate::record::{self, DataRecord, ResponseRound, Row, Scalar};

pub use advised::{ADVICE_PROMPT, advised_behavior};
pub use phases::base_behavior;

/// Returns the behaviour implementing `variant`.
///
/// # Errors
///
/// Returns a `PhaseError` if the behaviour's phase table is malformed.
pub fn behavior_for(variant: Variant) -> Result<Arc<Behavior<Trial>>, PhaseError> {
    let behavior = match variant {
        Variant::Trial => base_behavior()?,
        Variant::Advised => advised_behavior()?,
    };
    Ok(Arc::new(behavior))
}

/// Lifecycle of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialStatus {
    /// Built, not yet run
    Pending,
    /// Phases are executing
    Running,
    /// Every phase completed
    Complete,
    /// A phase failed; later phases did not run
    Failed,
}

/// A single experimental trial.
pub struct Trial {
    id: Uuid,
    behavior: Arc<Behavior<Self>>,
    config: TrialConfig,
    collaborators: Collaborators,
    prompts: PromptMap,
    clock: PhaseClock,
    record: DataRecord,
    correct_answer: Scalar,
    log: Vec<String>,
    timeouts: Vec<ResponseRound>,
    status: TrialStatus,
    active_phase: Option<PhaseName>,
    observers: Vec<Arc<dyn PhaseObserver<Self>>>,
}

impl Trial {
    /// Builds a trial running `behavior`.
    ///
    /// The record is seeded with the behaviour's fields, the correct answer is
    /// evaluated, the prompt map is resolved and the shared display is reset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the prompt names a phase the
    /// behaviour does not list.
    pub fn with_behavior(
        behavior: Arc<Behavior<Self>>,
        config: TrialConfig,
        collaborators: Collaborators,
    ) -> Result<Self, TrialKitError> {
        if let PromptSpec::PerPhase(map) = &config.prompt
            && let Some(phase) = map.keys().find(|p| !behavior.contains(**p))
        {
            return Err(ConfigError::InvalidValue {
                field: "prompt".to_string(),
                value: phase.to_string(),
                expected: format!("a phase of the '{}' behavior", behavior.name()),
            }
            .into());
        }

        let mut data = DataRecord::new();
        data.seed(behavior.seed_fields().iter().copied());

        let correct_answer = config.correct_answer.evaluate();
        data.set_trial(record::STIMULUS, config.stimulus.as_str());
        data.set_trial(record::CORRECT_ANSWER, correct_answer.clone());
        data.set_trial(record::NUMBER, config.number.and_then(|n| i64::try_from(n).ok()));
        data.set_trial(record::IS_ATTENTION_CHECK, i64::from(config.attention_check));

        let prompts = behavior.prompt_map(&config.prompt);
        collaborators.screen.reset();

        let id = Uuid::new_v4();
        debug!(%id, behavior = behavior.name(), "trial built");

        Ok(Self {
            id,
            behavior,
            config,
            collaborators,
            prompts,
            clock: PhaseClock::wall(),
            record: data,
            correct_answer,
            log: Vec::new(),
            timeouts: Vec::new(),
            status: TrialStatus::Pending,
            active_phase: None,
            observers: Vec::new(),
        })
    }

    /// Builds a trial of the given variant.
    ///
    /// # Errors
    ///
    /// See [`with_behavior`](Self::with_behavior).
    pub fn new(
        variant: Variant,
        config: TrialConfig,
        collaborators: Collaborators,
    ) -> Result<Self, TrialKitError> {
        Self::with_behavior(behavior_for(variant)?, config, collaborators)
    }

    /// Builds a base trial.
    ///
    /// # Errors
    ///
    /// See [`with_behavior`](Self::with_behavior).
    pub fn base(config: TrialConfig, collaborators: Collaborators) -> Result<Self, TrialKitError> {
        Self::new(Variant::Trial, config, collaborators)
    }

    /// Builds an advised trial.
    ///
    /// # Errors
    ///
    /// See [`with_behavior`](Self::with_behavior).
    pub fn advised(
        config: TrialConfig,
        collaborators: Collaborators,
    ) -> Result<Self, TrialKitError> {
        Self::new(Variant::Advised, config, collaborators)
    }

    /// Adds a phase observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PhaseObserver<Self>>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Replaces the time source used for every timestamp.
    #[must_use]
    pub fn with_clock(mut self, source: Arc<dyn TimeSource>) -> Self {
        self.clock = PhaseClock::new(source);
        self
    }

    // ========================================================================
    // Run
    // ========================================================================

    /// Runs every phase of the trial.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError::AlreadyRun` if the trial was run before, and
    /// `PhaseError::Failed` if a collaborator failed during a phase.
    pub async fn run(&mut self) -> Result<RunSummary, PhaseError> {
        if self.status != TrialStatus::Pending {
            return Err(PhaseError::AlreadyRun(self.id.to_string()));
        }
        self.status = TrialStatus::Running;

        let behavior = self.behavior.name();
        let span = info_span!("trial", id = %self.id, behavior);
        let sequencer = PhaseSequencer::new(Arc::clone(&self.behavior))
            .with_observers(self.observers.iter().cloned());

        let result = sequencer.run(self).instrument(span).await;
        match &result {
            Ok(summary) => {
                self.status = TrialStatus::Complete;
                metrics::record_trial(behavior, "complete");
                info!(id = %self.id, behavior, phases = summary.completed.len(), "trial complete");
            }
            Err(e) => {
                self.status = TrialStatus::Failed;
                metrics::record_trial(behavior, "failed");
                warn!(id = %self.id, behavior, error = %e, "trial failed");
            }
        }
        result
    }

    // ========================================================================
    // Response handling
    // ========================================================================

    /// Merges a first-round collector outcome into the record.
    pub fn process_response(&mut self, outcome: ResponseOutcome) {
        self.absorb_response(ResponseRound::First, outcome);
    }

    /// Merges a final-round collector outcome into the record.
    pub fn process_final_response(&mut self, outcome: ResponseOutcome) {
        self.absorb_response(ResponseRound::Final, outcome);
    }

    fn absorb_response(&mut self, round: ResponseRound, outcome: ResponseOutcome) {
        match outcome {
            ResponseOutcome::Given(fields) => {
                let origin = self.record.timestamp_start().unwrap_or_default();
                self.record.merge_response(round, &fields, origin);
            }
            ResponseOutcome::TimedOut => {
                warn!(id = %self.id, ?round, "response timed out");
                metrics::record_response_timeout(self.behavior.name(), round);
                self.timeouts.push(round);
                self.log.push(match round {
                    ResponseRound::First => "Timeout on response".to_string(),
                    ResponseRound::Final => "Timeout on final response".to_string(),
                });
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Flattens the record into a table row.
    ///
    /// Without `columns`, every recorded column is exported in insertion
    /// order; requested columns that were never recorded are null.
    #[must_use]
    pub fn to_table<C: AsRef<str>>(&self, columns: Option<&[C]>) -> Row {
        self.record.to_table(columns)
    }

    /// Column names of [`to_table`](Self::to_table) without an explicit list.
    #[must_use]
    pub fn table_headers(&self) -> Vec<String> {
        self.record.headers()
    }

    /// Read-only view passed to advisors and feedback routines.
    #[must_use]
    pub fn view(&self) -> TrialView<'_> {
        TrialView {
            id: self.id,
            number: self.config.number,
            stimulus: &self.config.stimulus,
            correct_answer: &self.correct_answer,
            record: &self.record,
        }
    }

    /// Trial identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The behaviour this trial runs.
    #[must_use]
    pub fn behavior(&self) -> &Behavior<Self> {
        &self.behavior
    }

    /// The trial configuration.
    #[must_use]
    pub const fn config(&self) -> &TrialConfig {
        &self.config
    }

    /// The accumulated record.
    #[must_use]
    pub const fn record(&self) -> &DataRecord {
        &self.record
    }

    /// The resolved prompt map.
    #[must_use]
    pub const fn prompts(&self) -> &PromptMap {
        &self.prompts
    }

    /// Log entries appended during the run.
    #[must_use]
    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Returns `true` if the response of `round` timed out.
    #[must_use]
    pub fn timed_out(&self, round: ResponseRound) -> bool {
        self.timeouts.contains(&round)
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> TrialStatus {
        self.status
    }

    /// Phase currently (or most recently) active.
    #[must_use]
    pub const fn active_phase(&self) -> Option<PhaseName> {
        self.active_phase
    }

    /// Milliseconds since `timestampStart`.
    #[must_use]
    pub fn trial_time(&self) -> i64 {
        self.clock.elapsed_ms()
    }
}

impl PhaseHost for Trial {
    fn before_phase(&mut self, phase: PhaseName) {
        self.active_phase = Some(phase);
        self.collaborators.screen.set_prompt(self.prompts.get(phase));
    }
}

impl std::fmt::Debug for Trial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trial")
            .field("id", &self.id)
            .field("behavior", &self.behavior.name())
            .field("status", &self.status)
            .field("active_phase", &self.active_phase)
            .field("collaborators", &self.collaborators)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
