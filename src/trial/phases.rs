//! Base trial phases.

use tracing::debug;

use crate::clock;
use crate::error::{CollaboratorError, PhaseError};
use crate::phase::{Behavior, PhaseFuture, PhaseName};
use crate::record::{
    Scalar, TIME_END, TIME_FEEDBACK_OFF, TIME_FEEDBACK_ON, TIME_RESPONSE_CLOSE,
    TIME_RESPONSE_OPEN, TIME_STIM_OFF, TIME_STIM_ON, TIMESTAMP_START,
};

use super::Trial;

/// The seven-phase trial: stimulus, response, optional feedback.
///
/// # Errors
///
/// Returns a `PhaseError` if the phase table is malformed.
pub fn base_behavior() -> Result<Behavior<Trial>, PhaseError> {
    Behavior::builder("trial")
        .phase(PhaseName::Begin, begin)
        .phase(PhaseName::ShowStim, show_stim)
        .phase(PhaseName::HideStim, hide_stim)
        .phase(PhaseName::GetResponse, get_response)
        .phase(PhaseName::ShowFeedback, show_feedback)
        .phase(PhaseName::End, end)
        .phase(PhaseName::Cleanup, cleanup)
        .seed_fields(&[
            TIMESTAMP_START,
            TIME_STIM_ON,
            TIME_STIM_OFF,
            TIME_RESPONSE_OPEN,
            TIME_RESPONSE_CLOSE,
            TIME_FEEDBACK_ON,
            TIME_FEEDBACK_OFF,
            TIME_END,
        ])
        .build()
}

fn begin(trial: &mut Trial) -> PhaseFuture<'_> {
    Box::pin(trial.begin())
}

fn show_stim(trial: &mut Trial) -> PhaseFuture<'_> {
    Box::pin(trial.show_stim())
}

fn hide_stim(trial: &mut Trial) -> PhaseFuture<'_> {
    Box::pin(trial.hide_stim())
}

fn get_response(trial: &mut Trial) -> PhaseFuture<'_> {
    Box::pin(trial.get_response())
}

fn show_feedback(trial: &mut Trial) -> PhaseFuture<'_> {
    Box::pin(trial.show_feedback())
}

fn end(trial: &mut Trial) -> PhaseFuture<'_> {
    Box::pin(std::future::ready(trial.end()))
}

fn cleanup(trial: &mut Trial) -> PhaseFuture<'_> {
    Box::pin(std::future::ready(trial.cleanup()))
}

impl Trial {
    /// Puts the stimulus up and marks the start clock.
    async fn begin(&mut self) -> Result<(), CollaboratorError> {
        self.collaborators
            .screen
            .show_stimulus(&self.config.stimulus)?;

        let start = self.clock.start();
        self.record.set_start(start);

        self.pause(self.config.durations.pre_stim()).await;
        Ok(())
    }

    async fn show_stim(&mut self) -> Result<(), CollaboratorError> {
        self.stamp(TIME_STIM_ON);
        self.pause(self.config.durations.stim()).await;
        Ok(())
    }

    async fn hide_stim(&mut self) -> Result<(), CollaboratorError> {
        self.stamp(TIME_STIM_OFF);
        if let Some(blank) = &self.config.blank_stimulus {
            self.collaborators.screen.show_stimulus(blank)?;
        }
        self.pause(self.config.durations.post_stim()).await;
        Ok(())
    }

    async fn get_response(&mut self) -> Result<(), CollaboratorError> {
        self.stamp(TIME_RESPONSE_OPEN);
        let outcome = self
            .collaborators
            .collector
            .get_response(self.config.durations.response(), true)
            .await?;
        self.stamp(TIME_RESPONSE_CLOSE);

        self.process_response(outcome);
        Ok(())
    }

    /// Awaits the feedback routine; without one both feedback times are null.
    async fn show_feedback(&mut self) -> Result<(), CollaboratorError> {
        let Some(feedback) = self.collaborators.feedback.clone() else {
            self.record.set_trial(TIME_FEEDBACK_ON, Scalar::Null);
            self.record.set_trial(TIME_FEEDBACK_OFF, Scalar::Null);
            return Ok(());
        };

        self.stamp(TIME_FEEDBACK_ON);
        feedback.display(&self.view()).await?;
        self.stamp(TIME_FEEDBACK_OFF);
        Ok(())
    }

    fn end(&mut self) -> Result<(), CollaboratorError> {
        self.stamp(TIME_END);
        Ok(())
    }

    /// Hands the collector and the display back in a fresh state.
    pub(super) fn cleanup(&mut self) -> Result<(), CollaboratorError> {
        self.collaborators.collector.reset();
        self.collaborators.screen.reset();
        Ok(())
    }

    /// Records the current trial time under `field`.
    pub(super) fn stamp(&mut self, field: &str) {
        let now = self.clock.elapsed_ms();
        self.record.set_trial(field, now);
    }

    pub(super) async fn pause(&self, duration: Option<std::time::Duration>) {
        if let Some(duration) = duration {
            debug!(id = %self.id, ms = clock::millis(duration), "waiting");
        }
        clock::wait(duration).await;
    }
}
