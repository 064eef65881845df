//! Advised trial: advice and a final response between the first response
//! and feedback.

use tracing::{debug, info};

use crate::error::{CollaboratorError, PhaseError};
use crate::phase::{Behavior, PhaseFuture, PhaseName, PhaseOp};
use crate::record::{FieldKey, TIME_RESPONSE_CLOSE_FINAL, TIME_RESPONSE_OPEN_FINAL};

use super::Trial;
use super::phases::base_behavior;

/// Prompt shown from `showAdvice` through `showFeedback` when a single prompt
/// string is configured.
pub const ADVICE_PROMPT: &str = "Consider the advice below and provide a final response.";

/// The nine-phase advised trial.
///
/// # Errors
///
/// Returns a `PhaseError` if the phase table is malformed.
pub fn advised_behavior() -> Result<Behavior<Trial>, PhaseError> {
    base_behavior()?
        .extend("advised")
        .insert_after(
            PhaseName::GetResponse,
            [
                (PhaseName::ShowAdvice, show_advice as PhaseOp<Trial>),
                (PhaseName::GetFinalResponse, get_final_response as PhaseOp<Trial>),
            ],
        )
        .replace(PhaseName::Cleanup, cleanup)
        .seed_fields(&[TIME_RESPONSE_OPEN_FINAL, TIME_RESPONSE_CLOSE_FINAL])
        .prompt_rule(advice_prompt)
        .build()
}

fn advice_prompt(phase: PhaseName, prompt: &str) -> String {
    match phase {
        PhaseName::ShowAdvice | PhaseName::GetFinalResponse | PhaseName::ShowFeedback => {
            ADVICE_PROMPT.to_owned()
        }
        PhaseName::End | PhaseName::Cleanup => String::new(),
        _ => prompt.to_owned(),
    }
}

fn show_advice(trial: &mut Trial) -> PhaseFuture<'_> {
    Box::pin(trial.show_advice())
}

fn get_final_response(trial: &mut Trial) -> PhaseFuture<'_> {
    Box::pin(trial.get_final_response())
}

fn cleanup(trial: &mut Trial) -> PhaseFuture<'_> {
    Box::pin(std::future::ready(trial.advised_cleanup()))
}

impl Trial {
    /// Records each advisor's table and advice in list order, drawing the
    /// advice and settling before moving to the next advisor.
    async fn show_advice(&mut self) -> Result<(), CollaboratorError> {
        let advisors = self.collaborators.advisors.clone();
        let settle = self.config.durations.advice();

        for (index, advisor) in advisors.iter().enumerate() {
            self.record.set(FieldKey::AdvisorMarker(index), index);
            self.record.merge_advisor(index, &advisor.to_table());

            let advice = advisor
                .get_advice(&self.view())
                .await
                .map_err(|e| match e {
                    CollaboratorError::Advisor { .. } => e,
                    CollaboratorError::Advice(message) => {
                        CollaboratorError::Advisor { index, message }
                    }
                    other => CollaboratorError::Advisor {
                        index,
                        message: other.to_string(),
                    },
                })?;
            self.record.merge_advisor(index, &advice);
            advisor.draw_advice();
            debug!(id = %self.id, index, fields = advice.len(), "advice drawn");

            self.pause(settle).await;
        }

        info!(id = %self.id, advisors = advisors.len(), "advice shown");
        Ok(())
    }

    async fn get_final_response(&mut self) -> Result<(), CollaboratorError> {
        self.stamp(TIME_RESPONSE_OPEN_FINAL);
        let outcome = self
            .collaborators
            .collector
            .get_response(self.config.durations.final_response(), false)
            .await?;
        self.stamp(TIME_RESPONSE_CLOSE_FINAL);

        self.process_final_response(outcome);
        Ok(())
    }

    fn advised_cleanup(&mut self) -> Result<(), CollaboratorError> {
        for advisor in &self.collaborators.advisors {
            advisor.hide_advice();
        }
        self.cleanup()
    }
}
