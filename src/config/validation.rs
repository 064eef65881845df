//! Session validation.
//!
//! Runs after deserialization and collects every issue instead of stopping
//! at the first one, so a session author sees all problems in one pass.

use std::collections::HashSet;

use crate::config::loader::ConfigLimits;
use crate::config::schema::{PromptSpec, SessionConfig, TrialConfig, Variant};
use crate::error::{Severity, ValidationIssue};
use crate::phase::PhaseName;
use crate::trial;

// ============================================================================
// Public API
// ============================================================================

/// Result of session validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Session validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a session and returns every issue found.
    pub fn validate(&mut self, config: &SessionConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_trials(config, limits);
        self.validate_simulation(config, limits);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Trials
    // ========================================================================

    fn validate_trials(&mut self, config: &SessionConfig, limits: &ConfigLimits) {
        if config.trials.is_empty() {
            self.add_error("trials", "session has no trials");
            return;
        }
        if config.trials.len() > limits.max_trials {
            self.add_error(
                "trials",
                &format!(
                    "session has {} trials (limit: {})",
                    config.trials.len(),
                    limits.max_trials
                ),
            );
        }

        let phases = self.phases_of(config.variant);
        let mut numbers = HashSet::new();
        for (i, trial) in config.trials.iter().enumerate() {
            let path = format!("trials[{i}]");
            self.check_trial(&path, trial, &phases);

            if let Some(number) = trial.number
                && !numbers.insert(number)
            {
                self.add_warning(
                    &format!("{path}.number"),
                    &format!("trial number {number} is used more than once"),
                );
            }
        }
    }

    fn check_trial(&mut self, path: &str, trial: &TrialConfig, phases: &[PhaseName]) {
        if trial.stimulus.trim().is_empty() {
            self.add_warning(&format!("{path}.stimulus"), "stimulus is empty");
        }

        if let PromptSpec::PerPhase(map) = &trial.prompt {
            for phase in map.keys() {
                if !phases.contains(phase) {
                    self.add_error(
                        &format!("{path}.prompt.{phase}"),
                        &format!("phase '{phase}' is not part of this trial variant"),
                    );
                }
            }
        }

        let durations = &trial.durations;
        if durations.final_response.is_some() && !phases.contains(&PhaseName::GetFinalResponse) {
            self.add_warning(
                &format!("{path}.durations.finalResponse"),
                "final response duration is ignored without a final response phase",
            );
        }
    }

    // ========================================================================
    // Simulation
    // ========================================================================

    fn validate_simulation(&mut self, config: &SessionConfig, limits: &ConfigLimits) {
        let simulation = &config.simulation;

        if simulation.advisors.len() > limits.max_advisors {
            self.add_error(
                "simulation.advisors",
                &format!(
                    "{} advisors configured (limit: {})",
                    simulation.advisors.len(),
                    limits.max_advisors
                ),
            );
        }

        let advised = config.variant == Variant::Advised;
        if advised && simulation.advisors.is_empty() {
            self.add_warning(
                "simulation.advisors",
                "advised trials have no advisors; showAdvice records nothing",
            );
        }
        if !advised && !simulation.advisors.is_empty() {
            self.add_warning(
                "simulation.advisors",
                "advisors are ignored by the base trial variant",
            );
        }
        if !advised && !simulation.final_responses.is_empty() {
            self.add_warning(
                "simulation.finalResponses",
                "final responses are ignored by the base trial variant",
            );
        }

        for (i, advisor) in simulation.advisors.iter().enumerate() {
            if advisor.name.trim().is_empty() {
                self.add_warning(&format!("simulation.advisors[{i}].name"), "advisor has no name");
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn phases_of(&mut self, variant: Variant) -> Vec<PhaseName> {
        match trial::behavior_for(variant) {
            Ok(behavior) => behavior.phases().collect(),
            Err(e) => {
                self.add_error("variant", &e.to_string());
                Vec::new()
            }
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{AdvisorScript, Durations};
    use indexmap::IndexMap;

    fn session(variant: Variant, trials: Vec<TrialConfig>) -> SessionConfig {
        SessionConfig {
            variant,
            trials,
            ..SessionConfig::default()
        }
    }

    fn validate(config: &SessionConfig) -> ValidationResult {
        Validator::new().validate(config, &ConfigLimits::default())
    }

    #[test]
    fn test_valid_session() {
        let result = validate(&session(Variant::Trial, vec![TrialConfig::new("a")]));
        assert!(!result.has_errors());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_no_trials_is_error() {
        let result = validate(&session(Variant::Trial, Vec::new()));
        assert!(result.has_errors());
        assert_eq!(result.errors[0].path, "trials");
    }

    #[test]
    fn test_prompt_for_foreign_phase_is_error() {
        let mut prompt = IndexMap::new();
        prompt.insert(PhaseName::ShowAdvice, "Consider".to_string());
        let trial = TrialConfig::new("a").with_prompt(PromptSpec::PerPhase(prompt));

        let base = validate(&session(Variant::Trial, vec![trial.clone()]));
        assert_eq!(base.errors.len(), 1);
        assert_eq!(base.errors[0].path, "trials[0].prompt.showAdvice");

        let advised = validate(&session(Variant::Advised, vec![trial]));
        assert!(!advised.has_errors());
    }

    #[test]
    fn test_collects_multiple_issues() {
        let mut prompt = IndexMap::new();
        prompt.insert(PhaseName::GetFinalResponse, "Again".to_string());
        let trials = vec![
            TrialConfig::new("").with_number(1),
            TrialConfig::new("b")
                .with_number(1)
                .with_prompt(PromptSpec::PerPhase(prompt))
                .with_durations(Durations {
                    final_response: Some(100),
                    ..Durations::default()
                }),
        ];
        let result = validate(&session(Variant::Trial, trials));
        assert_eq!(result.errors.len(), 1);
        // empty stimulus, duplicate number, ignored final duration
        assert_eq!(result.warnings.len(), 3);
    }

    #[test]
    fn test_advisor_limit() {
        let mut config = session(Variant::Advised, vec![TrialConfig::new("a")]);
        config.simulation.advisors = vec![AdvisorScript::default(); 3];
        let limits = ConfigLimits {
            max_advisors: 2,
            ..ConfigLimits::default()
        };
        let result = Validator::new().validate(&config, &limits);
        assert!(result.has_errors());
    }

    #[test]
    fn test_base_session_warns_about_advisors_and_final_responses() {
        let mut config = session(Variant::Trial, vec![TrialConfig::new("a")]);
        config.simulation.advisors = vec![AdvisorScript {
            name: "careful".to_string(),
            ..AdvisorScript::default()
        }];
        config.simulation.final_responses = vec![None];

        let result = validate(&config);
        assert!(!result.has_errors());
        let paths: Vec<&str> = result.warnings.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, vec!["simulation.advisors", "simulation.finalResponses"]);
    }
}
