//! Behaviour configurations.
//!
//! A [`Behavior`] is the complete description of a trial variant: the ordered
//! phase list, the operation executed for each phase, the record fields every
//! run of the variant is seeded with, and the rule used to expand a shared
//! prompt string. Variants are derived from one another with
//! [`Behavior::extend`] instead of subclassing.

use futures_util::future::BoxFuture;

use crate::config::schema::PromptSpec;
use crate::error::{CollaboratorError, PhaseError};

use super::name::PhaseName;
use super::prompt::{PromptMap, PromptRule, replicate};

/// Future returned by a phase operation.
pub type PhaseFuture<'a> = BoxFuture<'a, Result<(), CollaboratorError>>;

/// Operation executed for one phase against the sequenced state.
pub type PhaseOp<S> = for<'a> fn(&'a mut S) -> PhaseFuture<'a>;

/// One entry of a behaviour's operation table.
pub struct PhaseStep<S> {
    /// Phase identifier
    pub name: PhaseName,
    /// Operation run when the phase is entered
    pub op: PhaseOp<S>,
}

impl<S> Clone for PhaseStep<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for PhaseStep<S> {}

impl<S> std::fmt::Debug for PhaseStep<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseStep")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered phase list plus per-phase operation table.
///
/// Immutable once built; the sequencer snapshots the step list when a run
/// starts.
pub struct Behavior<S> {
    name: &'static str,
    steps: Vec<PhaseStep<S>>,
    seed_fields: Vec<&'static str>,
    prompt_rule: PromptRule,
}

impl<S> Behavior<S> {
    /// Starts a new, empty behaviour.
    #[must_use]
    pub fn builder(name: &'static str) -> BehaviorBuilder<S> {
        BehaviorBuilder {
            name,
            steps: Vec::new(),
            seed_fields: Vec::new(),
            prompt_rule: replicate,
            error: None,
        }
    }

    /// Starts a new behaviour that inherits this one's phases, seed fields
    /// and prompt rule.
    #[must_use]
    pub fn extend(&self, name: &'static str) -> BehaviorBuilder<S> {
        BehaviorBuilder {
            name,
            steps: self.steps.clone(),
            seed_fields: self.seed_fields.clone(),
            prompt_rule: self.prompt_rule,
            error: None,
        }
    }

    /// Behaviour name, used in logs and metrics labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The operation table in execution order.
    #[must_use]
    pub fn steps(&self) -> &[PhaseStep<S>] {
        &self.steps
    }

    /// The phase list in execution order.
    pub fn phases(&self) -> impl Iterator<Item = PhaseName> + '_ {
        self.steps.iter().map(|s| s.name)
    }

    /// Returns `true` if the behaviour lists `phase`.
    #[must_use]
    pub fn contains(&self, phase: PhaseName) -> bool {
        self.steps.iter().any(|s| s.name == phase)
    }

    /// Record fields seeded with null before the first phase runs.
    #[must_use]
    pub fn seed_fields(&self) -> &[&'static str] {
        &self.seed_fields
    }

    /// Resolves a prompt configuration into a total map over this
    /// behaviour's phases.
    ///
    /// Phases missing from an explicit mapping get the empty prompt.
    #[must_use]
    pub fn prompt_map(&self, spec: &PromptSpec) -> PromptMap {
        PromptMap::from_entries(self.phases().map(|phase| {
            let content = match spec {
                PromptSpec::None => String::new(),
                PromptSpec::Shared(text) => (self.prompt_rule)(phase, text),
                PromptSpec::PerPhase(map) => map.get(&phase).cloned().unwrap_or_default(),
            };
            (phase, content)
        }))
    }
}

impl<S> std::fmt::Debug for Behavior<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Behavior")
            .field("name", &self.name)
            .field("phases", &self.phases().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Behavior`].
///
/// Structural errors (unknown anchor, duplicate phase) are held until
/// [`build`](Self::build) so the builder chain stays infallible.
pub struct BehaviorBuilder<S> {
    name: &'static str,
    steps: Vec<PhaseStep<S>>,
    seed_fields: Vec<&'static str>,
    prompt_rule: PromptRule,
    error: Option<PhaseError>,
}

impl<S> BehaviorBuilder<S> {
    /// Appends a phase.
    #[must_use]
    pub fn phase(mut self, name: PhaseName, op: PhaseOp<S>) -> Self {
        self.steps.push(PhaseStep { name, op });
        self
    }

    /// Inserts phases directly after `anchor`, keeping their order.
    #[must_use]
    pub fn insert_after(
        mut self,
        anchor: PhaseName,
        steps: impl IntoIterator<Item = (PhaseName, PhaseOp<S>)>,
    ) -> Self {
        match self.position(anchor) {
            Some(at) => {
                let new_steps = steps.into_iter().map(|(name, op)| PhaseStep { name, op });
                self.steps.splice(at + 1..at + 1, new_steps);
            }
            None => self.fail_unknown(anchor),
        }
        self
    }

    /// Replaces the operation of an existing phase.
    #[must_use]
    pub fn replace(mut self, phase: PhaseName, op: PhaseOp<S>) -> Self {
        match self.position(phase) {
            Some(at) => self.steps[at].op = op,
            None => self.fail_unknown(phase),
        }
        self
    }

    /// Appends record fields to seed with null.
    #[must_use]
    pub fn seed_fields(mut self, fields: &[&'static str]) -> Self {
        for &field in fields {
            if !self.seed_fields.contains(&field) {
                self.seed_fields.push(field);
            }
        }
        self
    }

    /// Sets the rule used to expand a shared prompt string.
    #[must_use]
    pub fn prompt_rule(mut self, rule: PromptRule) -> Self {
        self.prompt_rule = rule;
        self
    }

    /// Validates and freezes the behaviour.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError::EmptyBehavior` if no phase was declared,
    /// `PhaseError::UnknownPhase` if an insertion anchor or replaced phase
    /// was missing, and `PhaseError::DuplicatePhase` if a phase is listed
    /// twice.
    pub fn build(self) -> Result<Behavior<S>, PhaseError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.steps.is_empty() {
            return Err(PhaseError::EmptyBehavior(self.name));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if self.steps[..i].iter().any(|s| s.name == step.name) {
                return Err(PhaseError::DuplicatePhase {
                    behavior: self.name,
                    phase: step.name,
                });
            }
        }
        Ok(Behavior {
            name: self.name,
            steps: self.steps,
            seed_fields: self.seed_fields,
            prompt_rule: self.prompt_rule,
        })
    }

    fn position(&self, phase: PhaseName) -> Option<usize> {
        self.steps.iter().position(|s| s.name == phase)
    }

    fn fail_unknown(&mut self, phase: PhaseName) {
        if self.error.is_none() {
            self.error = Some(PhaseError::UnknownPhase {
                behavior: self.name,
                phase,
            });
        }
    }
}
