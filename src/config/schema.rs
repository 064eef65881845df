//! Configuration schema.
//!
//! Session files are YAML with `camelCase` keys:
//!
//! ```yaml
//! variant: advised
//! trials:
//!   - stimulus: "<dots left=42 right=58/>"
//!     correctAnswer: right
//!     prompt: "Which side has more dots?"
//!     durations: { preStim: 0, stim: 300, postStim: 0 }
//! simulation:
//!   responses:
//!     - { answer: left, confidence: 60 }
//!   advisors:
//!     - name: alice
//!       table: { id: 1 }
//!       advice: { answer: right }
//! ```

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::phase::PhaseName;
use crate::record::{Row, Scalar};

// ============================================================================
// Prompts
// ============================================================================

/// Prompt configuration: nothing, one shared string, or per-phase content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptSpec {
    /// No prompt in any phase
    #[default]
    None,
    /// One string, expanded over the phases by the behaviour's prompt rule
    Shared(String),
    /// Explicit content per phase; unlisted phases show nothing
    PerPhase(IndexMap<PhaseName, String>),
}

// ============================================================================
// Durations
// ============================================================================

/// Phase durations in milliseconds.
///
/// `null` means no wait for fixed phases, and "leave it to the collector"
/// for response windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Durations {
    /// Wait after the stimulus is put on the display
    #[serde(default = "default_pre_stim")]
    pub pre_stim: Option<u64>,
    /// Stimulus visible
    #[serde(default = "default_stim")]
    pub stim: Option<u64>,
    /// Wait after the stimulus is hidden
    #[serde(default = "default_post_stim")]
    pub post_stim: Option<u64>,
    /// First response window
    #[serde(default)]
    pub response: Option<u64>,
    /// Settle interval after each advisor's advice is drawn
    #[serde(default = "default_advice")]
    pub advice: Option<u64>,
    /// Final response window; `null` inherits `response`
    #[serde(default)]
    pub final_response: Option<u64>,
}

#[allow(clippy::unnecessary_wraps)]
const fn default_pre_stim() -> Option<u64> {
    Some(500)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_stim() -> Option<u64> {
    Some(500)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_post_stim() -> Option<u64> {
    Some(100)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_advice() -> Option<u64> {
    Some(1000)
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            pre_stim: default_pre_stim(),
            stim: default_stim(),
            post_stim: default_post_stim(),
            response: None,
            advice: default_advice(),
            final_response: None,
        }
    }
}

impl Durations {
    /// Durations with no fixed waits at all.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            pre_stim: Some(0),
            stim: Some(0),
            post_stim: Some(0),
            response: None,
            advice: Some(0),
            final_response: None,
        }
    }

    /// Pre-stimulus wait.
    #[must_use]
    pub fn pre_stim(&self) -> Option<Duration> {
        self.pre_stim.map(Duration::from_millis)
    }

    /// Stimulus wait.
    #[must_use]
    pub fn stim(&self) -> Option<Duration> {
        self.stim.map(Duration::from_millis)
    }

    /// Post-stimulus wait.
    #[must_use]
    pub fn post_stim(&self) -> Option<Duration> {
        self.post_stim.map(Duration::from_millis)
    }

    /// First response timeout.
    #[must_use]
    pub fn response(&self) -> Option<Duration> {
        self.response.map(Duration::from_millis)
    }

    /// Per-advisor settle interval.
    #[must_use]
    pub fn advice(&self) -> Option<Duration> {
        self.advice.map(Duration::from_millis)
    }

    /// Final response timeout, falling back to the first response timeout.
    #[must_use]
    pub fn final_response(&self) -> Option<Duration> {
        self.final_response
            .or(self.response)
            .map(Duration::from_millis)
    }
}

// ============================================================================
// Correct Answer
// ============================================================================

/// Correct answer: a literal, or a function evaluated once at construction.
#[derive(Clone, Deserialize)]
#[serde(from = "Scalar")]
pub enum CorrectAnswer {
    /// Literal value
    Value(Scalar),
    /// Value-producing function
    Computed(Arc<dyn Fn() -> Scalar + Send + Sync>),
}

impl CorrectAnswer {
    /// Wraps a value-producing function.
    pub fn computed(f: impl Fn() -> Scalar + Send + Sync + 'static) -> Self {
        Self::Computed(Arc::new(f))
    }

    /// Produces the value to record.
    #[must_use]
    pub fn evaluate(&self) -> Scalar {
        match self {
            Self::Value(v) => v.clone(),
            Self::Computed(f) => f(),
        }
    }
}

impl Default for CorrectAnswer {
    fn default() -> Self {
        Self::Value(Scalar::Null)
    }
}

impl From<Scalar> for CorrectAnswer {
    fn from(v: Scalar) -> Self {
        Self::Value(v)
    }
}

impl std::fmt::Debug for CorrectAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

// ============================================================================
// Trial
// ============================================================================

/// Configuration of one trial; immutable once the trial is built.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrialConfig {
    /// Stimulus content shown from `begin` until `hideStim`
    pub stimulus: String,
    /// Content shown in place of the stimulus after `hideStim`
    #[serde(default)]
    pub blank_stimulus: Option<String>,
    /// Correct answer, recorded as `correctAnswer`
    #[serde(default)]
    pub correct_answer: CorrectAnswer,
    /// Prompt content
    #[serde(default)]
    pub prompt: PromptSpec,
    /// Phase durations
    #[serde(default)]
    pub durations: Durations,
    /// Trial number within the session
    #[serde(default)]
    pub number: Option<u64>,
    /// Whether this trial is an attention check
    #[serde(default)]
    pub attention_check: bool,
}

impl TrialConfig {
    /// Configuration with the given stimulus and defaults for everything else.
    pub fn new(stimulus: impl Into<String>) -> Self {
        Self {
            stimulus: stimulus.into(),
            ..Self::default()
        }
    }

    /// Sets the correct answer.
    #[must_use]
    pub fn with_correct_answer(mut self, answer: impl Into<CorrectAnswer>) -> Self {
        self.correct_answer = answer.into();
        self
    }

    /// Sets the prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: PromptSpec) -> Self {
        self.prompt = prompt;
        self
    }

    /// Sets the durations.
    #[must_use]
    pub const fn with_durations(mut self, durations: Durations) -> Self {
        self.durations = durations;
        self
    }

    /// Sets the blank stimulus.
    #[must_use]
    pub fn with_blank_stimulus(mut self, blank: impl Into<String>) -> Self {
        self.blank_stimulus = Some(blank.into());
        self
    }

    /// Sets the trial number.
    #[must_use]
    pub const fn with_number(mut self, number: u64) -> Self {
        self.number = Some(number);
        self
    }

    /// Marks the trial as an attention check.
    #[must_use]
    pub const fn with_attention_check(mut self, attention_check: bool) -> Self {
        self.attention_check = attention_check;
        self
    }
}

// ============================================================================
// Session
// ============================================================================

/// Trial variant run for every trial of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Variant {
    /// Base seven-phase trial
    #[default]
    Trial,
    /// Trial with advice and a final response
    Advised,
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trial => f.write_str("trial"),
            Self::Advised => f.write_str("advised"),
        }
    }
}

/// Scripted advisor for simulated sessions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdvisorScript {
    /// Advisor name, used in logs
    pub name: String,
    /// Descriptive fields recorded as `advisor{i}{field}`
    #[serde(default)]
    pub table: Row,
    /// Advice returned on every trial
    #[serde(default)]
    pub advice: Row,
}

/// Scripted collaborators for simulated sessions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimulationConfig {
    /// First-round responses, one per trial, cycled; `null` simulates a timeout
    #[serde(default)]
    pub responses: Vec<Option<Row>>,
    /// Final-round responses, one per trial, cycled
    #[serde(default)]
    pub final_responses: Vec<Option<Row>>,
    /// Simulated response latency in milliseconds
    #[serde(default)]
    pub response_latency: u64,
    /// Advisors, in presentation order
    #[serde(default)]
    pub advisors: Vec<AdvisorScript>,
    /// Feedback display time in milliseconds; absent means no feedback
    #[serde(default)]
    pub feedback: Option<u64>,
}

/// A session file: the variant, the trials and the simulation script.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionConfig {
    /// Trial variant
    #[serde(default)]
    pub variant: Variant,
    /// Trials, run in order
    pub trials: Vec<TrialConfig>,
    /// Scripted collaborators
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_defaults() {
        let durations = Durations::default();
        assert_eq!(durations.pre_stim(), Some(Duration::from_millis(500)));
        assert_eq!(durations.stim(), Some(Duration::from_millis(500)));
        assert_eq!(durations.post_stim(), Some(Duration::from_millis(100)));
        assert_eq!(durations.response(), None);
        assert_eq!(durations.advice(), Some(Duration::from_millis(1000)));
        assert_eq!(durations.final_response(), None);
    }

    #[test]
    fn test_final_response_inherits_response() {
        let durations: Durations = serde_yaml::from_str("response: 2000").unwrap();
        assert_eq!(durations.final_response(), Some(Duration::from_millis(2000)));

        let durations: Durations =
            serde_yaml::from_str("response: 2000\nfinalResponse: 500").unwrap();
        assert_eq!(durations.final_response(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_explicit_null_duration_disables_wait() {
        let durations: Durations = serde_yaml::from_str("preStim: null").unwrap();
        assert_eq!(durations.pre_stim(), None);
        assert_eq!(durations.stim(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_prompt_spec_forms() {
        let spec: PromptSpec = serde_yaml::from_str("\"Look closely\"").unwrap();
        assert_eq!(spec, PromptSpec::Shared("Look closely".to_string()));

        let spec: PromptSpec =
            serde_yaml::from_str("begin: Ready\ngetResponse: Answer").unwrap();
        let PromptSpec::PerPhase(map) = spec else {
            panic!("expected per-phase prompt");
        };
        assert_eq!(map[&PhaseName::GetResponse], "Answer");

        let spec: PromptSpec = serde_yaml::from_str("null").unwrap();
        assert_eq!(spec, PromptSpec::None);
    }

    #[test]
    fn test_correct_answer_literal_and_computed() {
        let trial: TrialConfig =
            serde_yaml::from_str("stimulus: x\ncorrectAnswer: 42").unwrap();
        assert_eq!(trial.correct_answer.evaluate(), Scalar::Int(42));

        let computed = CorrectAnswer::computed(|| Scalar::from("left"));
        assert_eq!(computed.evaluate(), Scalar::Text("left".into()));
        assert_eq!(format!("{computed:?}"), "Computed(<fn>)");
    }

    #[test]
    fn test_trial_unknown_field_rejected() {
        let result: Result<TrialConfig, _> = serde_yaml::from_str("stimulus: x\nstim: y");
        assert!(result.is_err());
    }

    #[test]
    fn test_session_parses_simulation() {
        let yaml = r"
variant: advised
trials:
  - stimulus: a
    number: 1
    attentionCheck: true
simulation:
  responses:
    - { value: 7 }
    - null
  responseLatency: 20
  advisors:
    - name: alice
      advice: { direction: left }
  feedback: 250
";
        let session: SessionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(session.variant, Variant::Advised);
        assert_eq!(session.trials[0].number, Some(1));
        assert!(session.trials[0].attention_check);
        assert_eq!(session.simulation.responses.len(), 2);
        assert!(session.simulation.responses[1].is_none());
        assert_eq!(session.simulation.advisors[0].advice["direction"], Scalar::from("left"));
        assert_eq!(session.simulation.feedback, Some(250));
    }
}
