//! Phase sequencer.
//!
//! Executes a [`Behavior`] against a state value one phase at a time. Each
//! phase future is awaited to completion before the host hook of the next
//! phase runs, so no two phases of the same state ever overlap. A failing
//! phase stops the run and is reported as [`PhaseError::Failed`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock;
use crate::error::PhaseError;
use crate::observability::metrics;

use super::behavior::{Behavior, PhaseStep};
use super::name::PhaseName;

/// State driven by a [`PhaseSequencer`].
pub trait PhaseHost: Send + Sync {
    /// Marks `phase` as active, before observers are notified and before
    /// its operation runs.
    fn before_phase(&mut self, phase: PhaseName);

    /// Called once `phase` has completed successfully.
    fn after_phase(&mut self, phase: PhaseName, elapsed: Duration) {
        let _ = (phase, elapsed);
    }
}

/// External observer notified at every phase transition.
///
/// Notifications are awaited in registration order; an observer that
/// suspends delays the phase it is notified about.
#[async_trait]
pub trait PhaseObserver<S: ?Sized + Sync>: Send + Sync {
    /// Called after the host marked `phase` active, before it runs.
    async fn on_phase(&self, phase: PhaseName, state: &S);

    /// Called after `phase` completed successfully.
    async fn on_phase_complete(&self, phase: PhaseName, state: &S) {
        let _ = (phase, state);
    }
}

/// Adapts a plain `(phase, state)` callback into a [`PhaseObserver`].
pub struct CallbackObserver<F>(pub F);

#[async_trait]
impl<S, F> PhaseObserver<S> for CallbackObserver<F>
where
    S: ?Sized + Sync,
    F: Fn(PhaseName, &S) + Send + Sync,
{
    async fn on_phase(&self, phase: PhaseName, state: &S) {
        (self.0)(phase, state);
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Behaviour that was executed
    pub behavior: &'static str,
    /// Phases completed, in execution order
    pub completed: Vec<PhaseName>,
    /// Total time spent in the run
    pub elapsed: Duration,
}

/// Executes a behaviour's phases in order.
pub struct PhaseSequencer<S: Sync> {
    behavior: Arc<Behavior<S>>,
    observers: Vec<Arc<dyn PhaseObserver<S>>>,
}

impl<S> PhaseSequencer<S>
where
    S: PhaseHost,
{
    /// Creates a sequencer for `behavior` with no observers.
    #[must_use]
    pub fn new(behavior: Arc<Behavior<S>>) -> Self {
        Self {
            behavior,
            observers: Vec::new(),
        }
    }

    /// Adds an observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PhaseObserver<S>>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Adds several observers, keeping their order.
    #[must_use]
    pub fn with_observers(
        mut self,
        observers: impl IntoIterator<Item = Arc<dyn PhaseObserver<S>>>,
    ) -> Self {
        self.observers.extend(observers);
        self
    }

    /// The behaviour this sequencer executes.
    #[must_use]
    pub fn behavior(&self) -> &Behavior<S> {
        &self.behavior
    }

    /// Runs every phase of the behaviour against `state`.
    ///
    /// The phase list is read once, when the run starts.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError::Failed` naming the first phase whose operation
    /// failed. Later phases are not executed.
    pub async fn run(&self, state: &mut S) -> Result<RunSummary, PhaseError> {
        let steps: Vec<PhaseStep<S>> = self.behavior.steps().to_vec();
        let behavior = self.behavior.name();
        let started = Instant::now();
        let mut completed = Vec::with_capacity(steps.len());

        for (index, step) in steps.into_iter().enumerate() {
            state.before_phase(step.name);
            for observer in &self.observers {
                observer.on_phase(step.name, &*state).await;
            }

            info!(behavior, phase = %step.name, index, "phase started");
            let phase_started = Instant::now();

            if let Err(source) = (step.op)(&mut *state).await {
                warn!(behavior, phase = %step.name, error = %source, "phase failed");
                metrics::record_phase_failed(behavior, step.name);
                return Err(PhaseError::Failed {
                    phase: step.name,
                    source,
                });
            }

            let elapsed = phase_started.elapsed();
            debug!(
                behavior,
                phase = %step.name,
                elapsed_ms = clock::millis(elapsed),
                "phase completed"
            );
            metrics::record_phase_completed(behavior, step.name, elapsed);

            state.after_phase(step.name, elapsed);
            for observer in &self.observers {
                observer.on_phase_complete(step.name, &*state).await;
            }
            completed.push(step.name);
        }

        Ok(RunSummary {
            behavior,
            completed,
            elapsed: started.elapsed(),
        })
    }
}

impl<S: Sync> std::fmt::Debug for PhaseSequencer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseSequencer")
            .field("behavior", &self.behavior)
            .field("observers", &self.observers.len())
            .finish()
    }
}
