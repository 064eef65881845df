//! Collaborator interfaces.
//!
//! A trial never renders anything or talks to a participant itself. The
//! response widget, the advisors, the feedback routine and the shared
//! display are handed in at construction as trait objects and driven from
//! the phase operations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CollaboratorError;
use crate::record::{DataRecord, Row, Scalar};

// ============================================================================
// Outcomes
// ============================================================================

/// Result of asking the collector for a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// The participant responded with these fields
    Given(Row),
    /// The response window closed with no response
    TimedOut,
}

impl ResponseOutcome {
    /// Returns `true` for [`ResponseOutcome::TimedOut`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

/// Read-only view of a trial handed to advisors and feedback routines.
#[derive(Debug, Clone, Copy)]
pub struct TrialView<'a> {
    /// Trial identifier
    pub id: Uuid,
    /// Trial number within the session
    pub number: Option<u64>,
    /// Stimulus content
    pub stimulus: &'a str,
    /// Evaluated correct answer
    pub correct_answer: &'a Scalar,
    /// Record as accumulated so far
    pub record: &'a DataRecord,
}

// ============================================================================
// Traits
// ============================================================================

/// Supplies the participant's responses.
#[async_trait]
pub trait ResponseCollector: Send + Sync {
    /// Waits for a response.
    ///
    /// `timeout = None` leaves the window length to the collector.
    /// `reset_first = false` keeps the widget state from the previous round.
    async fn get_response(
        &self,
        timeout: Option<Duration>,
        reset_first: bool,
    ) -> Result<ResponseOutcome, CollaboratorError>;

    /// Returns the widget to its fresh state.
    fn reset(&self);
}

/// Supplies advice between the first and final response.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Descriptive fields recorded for this advisor.
    fn to_table(&self) -> Row;

    /// Produces the advice for the trial.
    async fn get_advice(&self, trial: &TrialView<'_>) -> Result<Row, CollaboratorError>;

    /// Shows the advice produced by the last `get_advice` call.
    fn draw_advice(&self);

    /// Removes any displayed advice.
    fn hide_advice(&self);
}

/// User-supplied feedback routine.
#[async_trait]
pub trait FeedbackDisplay: Send + Sync {
    /// Shows feedback; the phase lasts until this resolves.
    async fn display(&self, trial: &TrialView<'_>) -> Result<(), CollaboratorError>;
}

/// Shared visual resource (stimulus and prompt areas).
pub trait Screen: Send + Sync {
    /// Puts `content` in the stimulus area.
    ///
    /// # Errors
    ///
    /// Returns `CollaboratorError::Display` if the display cannot be updated.
    fn show_stimulus(&self, content: &str) -> Result<(), CollaboratorError>;

    /// Puts `content` in the prompt area.
    fn set_prompt(&self, content: &str);

    /// Clears the stimulus and prompt areas.
    fn reset(&self);
}

// ============================================================================
// Bundle
// ============================================================================

/// Collaborator handles owned by one trial.
#[derive(Clone)]
pub struct Collaborators {
    /// Response widget
    pub collector: Arc<dyn ResponseCollector>,
    /// Shared display
    pub screen: Arc<dyn Screen>,
    /// Advisors in presentation order
    pub advisors: Vec<Arc<dyn Advisor>>,
    /// Optional feedback routine
    pub feedback: Option<Arc<dyn FeedbackDisplay>>,
}

impl Collaborators {
    /// Bundle with no advisors and no feedback.
    #[must_use]
    pub fn new(collector: Arc<dyn ResponseCollector>, screen: Arc<dyn Screen>) -> Self {
        Self {
            collector,
            screen,
            advisors: Vec::new(),
            feedback: None,
        }
    }

    /// Appends an advisor.
    #[must_use]
    pub fn with_advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.advisors.push(advisor);
        self
    }

    /// Appends several advisors, keeping their order.
    #[must_use]
    pub fn with_advisors(mut self, advisors: impl IntoIterator<Item = Arc<dyn Advisor>>) -> Self {
        self.advisors.extend(advisors);
        self
    }

    /// Sets the feedback routine.
    #[must_use]
    pub fn with_feedback(mut self, feedback: Arc<dyn FeedbackDisplay>) -> Self {
        self.feedback = Some(feedback);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("advisors", &self.advisors.len())
            .field("feedback", &self.feedback.is_some())
            .finish_non_exhaustive()
    }
}
