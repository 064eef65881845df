//! Scripted collaborators.
//!
//! Stand-ins for the participant-facing components, driven by a script
//! instead of a person. The CLI uses them for dry runs of session files and
//! the tests use them to exercise every phase.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::clock::{self, TimeSource};
use crate::collaborator::{Advisor, FeedbackDisplay, ResponseCollector, ResponseOutcome, Screen, TrialView};
use crate::config::schema::AdvisorScript;
use crate::error::CollaboratorError;
use crate::record::{Row, Scalar};

// ============================================================================
// Response Collector
// ============================================================================

/// Collector answering from a queue of scripted responses.
///
/// Each request takes the next entry; `None` entries time out. A response
/// slower than the requested timeout also times out. When a time source is
/// attached, responses without a `time` field are stamped with the time
/// they were given.
pub struct ScriptedCollector {
    script: Mutex<VecDeque<Option<Row>>>,
    latency: Duration,
    clock: Option<Arc<dyn TimeSource>>,
    requests: Mutex<Vec<(Option<Duration>, bool)>>,
    resets: AtomicUsize,
}

impl ScriptedCollector {
    /// Collector answering with `script`, in order.
    #[must_use]
    pub fn new(script: impl IntoIterator<Item = Option<Row>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            latency: Duration::ZERO,
            clock: None,
            requests: Mutex::new(Vec::new()),
            resets: AtomicUsize::new(0),
        }
    }

    /// Delays every response by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Stamps responses with a `time` field read from `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// `(timeout, reset_first)` of every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<(Option<Duration>, bool)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `reset` calls.
    #[must_use]
    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseCollector for ScriptedCollector {
    async fn get_response(
        &self,
        timeout: Option<Duration>,
        reset_first: bool,
    ) -> Result<ResponseOutcome, CollaboratorError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((timeout, reset_first));

        let entry = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| CollaboratorError::Collector("response script exhausted".to_string()))?;

        match entry {
            Some(mut response) if timeout.is_none_or(|t| self.latency <= t) => {
                clock::wait(Some(self.latency)).await;
                if let Some(clock) = &self.clock {
                    response
                        .entry("time".to_string())
                        .or_insert_with(|| Scalar::Int(clock.now_ms()));
                }
                debug!(fields = response.len(), "scripted response given");
                Ok(ResponseOutcome::Given(response))
            }
            _ => {
                clock::wait(timeout.or(Some(self.latency))).await;
                debug!("scripted response timed out");
                Ok(ResponseOutcome::TimedOut)
            }
        }
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Advisor
// ============================================================================

/// Advisor returning the same advice on every trial.
pub struct ScriptedAdvisor {
    name: String,
    table: Row,
    advice: Row,
    failure: Option<String>,
    drawn: AtomicUsize,
    hidden: AtomicUsize,
}

impl ScriptedAdvisor {
    /// Advisor with the given descriptive table and advice.
    #[must_use]
    pub fn new(name: impl Into<String>, table: Row, advice: Row) -> Self {
        Self {
            name: name.into(),
            table,
            advice,
            failure: None,
            drawn: AtomicUsize::new(0),
            hidden: AtomicUsize::new(0),
        }
    }

    /// Advisor described by a session file entry.
    #[must_use]
    pub fn from_script(script: &AdvisorScript) -> Self {
        Self::new(&script.name, script.table.clone(), script.advice.clone())
    }

    /// Advisor whose `get_advice` always fails with `message`.
    #[must_use]
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(name, Row::new(), Row::new())
        }
    }

    /// Number of `draw_advice` calls.
    #[must_use]
    pub fn drawn(&self) -> usize {
        self.drawn.load(Ordering::SeqCst)
    }

    /// Number of `hide_advice` calls.
    #[must_use]
    pub fn hidden(&self) -> usize {
        self.hidden.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Advisor for ScriptedAdvisor {
    fn to_table(&self) -> Row {
        self.table.clone()
    }

    async fn get_advice(&self, trial: &TrialView<'_>) -> Result<Row, CollaboratorError> {
        if let Some(message) = &self.failure {
            return Err(CollaboratorError::Advice(message.clone()));
        }
        debug!(advisor = %self.name, trial = %trial.id, "advice requested");
        Ok(self.advice.clone())
    }

    fn draw_advice(&self) {
        self.drawn.fetch_add(1, Ordering::SeqCst);
    }

    fn hide_advice(&self) {
        self.hidden.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Screen
// ============================================================================

#[derive(Debug, Default)]
struct ScreenState {
    stimulus: String,
    prompt: String,
    prompt_history: Vec<String>,
    resets: usize,
}

/// Display that logs every change and remembers what it shows.
#[derive(Debug, Default)]
pub struct TracingScreen {
    state: Mutex<ScreenState>,
    broken: bool,
}

impl TracingScreen {
    /// Display whose `show_stimulus` always fails.
    #[must_use]
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    /// Content of the stimulus area.
    #[must_use]
    pub fn stimulus(&self) -> String {
        self.state().stimulus.clone()
    }

    /// Content of the prompt area.
    #[must_use]
    pub fn prompt(&self) -> String {
        self.state().prompt.clone()
    }

    /// Every prompt set so far, in order.
    #[must_use]
    pub fn prompt_history(&self) -> Vec<String> {
        self.state().prompt_history.clone()
    }

    /// Number of `reset` calls.
    #[must_use]
    pub fn reset_count(&self) -> usize {
        self.state().resets
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ScreenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Screen for TracingScreen {
    fn show_stimulus(&self, content: &str) -> Result<(), CollaboratorError> {
        if self.broken {
            return Err(CollaboratorError::Display("stimulus area unavailable".to_string()));
        }
        debug!(content, "stimulus shown");
        content.clone_into(&mut self.state().stimulus);
        Ok(())
    }

    fn set_prompt(&self, content: &str) {
        debug!(content, "prompt set");
        let mut state = self.state();
        content.clone_into(&mut state.prompt);
        state.prompt_history.push(content.to_owned());
    }

    fn reset(&self) {
        let mut state = self.state();
        state.stimulus.clear();
        state.prompt.clear();
        state.resets += 1;
    }
}

// ============================================================================
// Feedback
// ============================================================================

/// Feedback routine that logs the outcome and holds the display for a
/// fixed time.
#[derive(Debug, Default)]
pub struct DelayFeedback {
    delay: Duration,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl DelayFeedback {
    /// Feedback lasting `delay`.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Feedback whose `display` always fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(Duration::ZERO)
        }
    }

    /// Number of `display` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedbackDisplay for DelayFeedback {
    async fn display(&self, trial: &TrialView<'_>) -> Result<(), CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(CollaboratorError::Feedback(message.clone()));
        }
        let answer = trial
            .record
            .get_column("responseAnswer")
            .or_else(|| trial.record.get_column("responseValue"))
            .cloned()
            .unwrap_or_default();
        info!(
            trial = %trial.id,
            correct_answer = %trial.correct_answer,
            response = %answer,
            stimulus = trial.stimulus,
            "feedback"
        );
        clock::wait(Some(self.delay)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::record::DataRecord;
    use uuid::Uuid;

    fn row(pairs: &[(&str, Scalar)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_collector_follows_script() {
        let collector = ScriptedCollector::new(vec![Some(row(&[("value", Scalar::Int(7))])), None]);

        let first = collector.get_response(None, true).await.unwrap();
        assert_eq!(first, ResponseOutcome::Given(row(&[("value", Scalar::Int(7))])));

        let second = collector.get_response(Some(Duration::from_millis(50)), false).await.unwrap();
        assert!(second.is_timeout());

        assert_eq!(
            collector.requests(),
            vec![(None, true), (Some(Duration::from_millis(50)), false)]
        );
    }

    #[tokio::test]
    async fn test_collector_exhausted_is_error() {
        let collector = ScriptedCollector::new(Vec::new());
        let err = collector.get_response(None, true).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Collector(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_response_times_out() {
        let collector = ScriptedCollector::new(vec![Some(row(&[("value", Scalar::Int(1))]))])
            .with_latency(Duration::from_millis(300));
        let started = tokio::time::Instant::now();
        let outcome = collector
            .get_response(Some(Duration::from_millis(100)), true)
            .await
            .unwrap();
        assert!(outcome.is_timeout());
        assert_eq!(started.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collector_stamps_time() {
        let clock = Arc::new(TokioClock::new());
        let collector = ScriptedCollector::new(vec![
            Some(row(&[("value", Scalar::Int(1))])),
            Some(row(&[("time", Scalar::Int(5))])),
        ])
        .with_latency(Duration::from_millis(120))
        .with_clock(clock);

        let ResponseOutcome::Given(first) = collector.get_response(None, true).await.unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(first["time"], Scalar::Int(120));

        // An explicit time is kept
        let ResponseOutcome::Given(second) = collector.get_response(None, true).await.unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(second["time"], Scalar::Int(5));
    }

    #[tokio::test]
    async fn test_advisor_counts_draw_and_hide() {
        let advisor = ScriptedAdvisor::new(
            "alice",
            row(&[("id", Scalar::Int(1))]),
            row(&[("direction", Scalar::from("left"))]),
        );
        let record = DataRecord::new();
        let view = TrialView {
            id: Uuid::nil(),
            number: None,
            stimulus: "",
            correct_answer: &Scalar::Null,
            record: &record,
        };
        let advice = advisor.get_advice(&view).await.unwrap();
        assert_eq!(advice["direction"], Scalar::from("left"));
        assert_eq!(advisor.to_table()["id"], Scalar::Int(1));

        advisor.draw_advice();
        advisor.hide_advice();
        advisor.hide_advice();
        assert_eq!(advisor.drawn(), 1);
        assert_eq!(advisor.hidden(), 2);
    }

    #[tokio::test]
    async fn test_failing_collaborators_report_their_own_errors() {
        let record = DataRecord::new();
        let view = TrialView {
            id: Uuid::nil(),
            number: None,
            stimulus: "",
            correct_answer: &Scalar::Null,
            record: &record,
        };

        let advisor = ScriptedAdvisor::failing("bob", "no signal");
        let err = advisor.get_advice(&view).await.unwrap_err();
        assert!(matches!(&err, CollaboratorError::Advice(m) if m == "no signal"), "{err:?}");

        let feedback = DelayFeedback::failing("projector off");
        let err = feedback.display(&view).await.unwrap_err();
        assert!(matches!(&err, CollaboratorError::Feedback(m) if m == "projector off"), "{err:?}");
        assert_eq!(feedback.calls(), 1);
    }

    #[test]
    fn test_screen_tracks_state() {
        let screen = TracingScreen::default();
        screen.show_stimulus("dots").unwrap();
        screen.set_prompt("Which side?");
        assert_eq!(screen.stimulus(), "dots");
        assert_eq!(screen.prompt(), "Which side?");

        screen.reset();
        assert_eq!(screen.stimulus(), "");
        assert_eq!(screen.prompt(), "");
        assert_eq!(screen.prompt_history(), vec!["Which side?"]);
        assert_eq!(screen.reset_count(), 1);

        assert!(TracingScreen::broken().show_stimulus("x").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_waits() {
        let feedback = DelayFeedback::new(Duration::from_millis(250));
        let record = DataRecord::new();
        let view = TrialView {
            id: Uuid::nil(),
            number: Some(1),
            stimulus: "x",
            correct_answer: &Scalar::Int(42),
            record: &record,
        };
        let started = tokio::time::Instant::now();
        feedback.display(&view).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(250));
        assert_eq!(feedback.calls(), 1);
    }
}
