//! `run` command handler.
//!
//! Plays the orchestrator for a simulated session: every trial is built with
//! scripted collaborators, run to completion, and its table row written to
//! stdout as one JSON line.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::cli::args::RunArgs;
use crate::clock::{self, TimeSource, WallClock};
use crate::collaborator::{Advisor, Collaborators, FeedbackDisplay};
use crate::config::loader::ConfigLoader;
use crate::config::schema::{SimulationConfig, Variant};
use crate::error::TrialKitError;
use crate::observability::events::{Event, EventEmitter, EventObserver};
use crate::record::Row;
use crate::sim::{DelayFeedback, ScriptedAdvisor, ScriptedCollector, TracingScreen};
use crate::trial::{Trial, behavior_for};

/// Run every trial of a session file.
///
/// # Errors
///
/// Returns a config error if the session does not load, an I/O error if the
/// event file or stdout cannot be written, and a phase error for the first
/// trial that fails. Trials after a failed one are not run.
pub async fn run(args: &RunArgs) -> Result<(), TrialKitError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    info!(config = %args.config.display(), "loading session");
    let load_result = ConfigLoader::with_defaults().load(&args.config)?;
    for warning in &load_result.warnings {
        warn!(location = %warning.path, "{}", warning.message);
    }
    let session = load_result.config;

    let emitter = Arc::new(match &args.events {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    });

    let behavior = behavior_for(session.variant)?;
    let time_source: Arc<dyn TimeSource> = Arc::new(WallClock);
    let screen = Arc::new(TracingScreen::default());
    let advisors: Vec<Arc<dyn Advisor>> = session
        .simulation
        .advisors
        .iter()
        .map(|script| Arc::new(ScriptedAdvisor::from_script(script)) as Arc<dyn Advisor>)
        .collect();
    let feedback = session.simulation.feedback.map(|ms| {
        Arc::new(DelayFeedback::new(Duration::from_millis(ms))) as Arc<dyn FeedbackDisplay>
    });

    let mut stdout = std::io::stdout();
    for (index, config) in session.trials.iter().enumerate() {
        let collector = ScriptedCollector::new(response_script(
            &session.simulation,
            session.variant,
            index,
        ))
        .with_latency(Duration::from_millis(session.simulation.response_latency))
        .with_clock(Arc::clone(&time_source));

        let mut collaborators = Collaborators::new(Arc::new(collector), screen.clone())
            .with_advisors(advisors.iter().cloned());
        if let Some(feedback) = &feedback {
            collaborators = collaborators.with_feedback(Arc::clone(feedback));
        }

        let mut trial = Trial::with_behavior(Arc::clone(&behavior), config.clone(), collaborators)?
            .with_clock(Arc::clone(&time_source))
            .with_observer(Arc::new(EventObserver::new(Arc::clone(&emitter))));

        emitter.emit(Event::TrialStarted {
            timestamp: Utc::now(),
            trial_id: trial.id(),
            behavior: behavior.name().to_owned(),
            number: config.number,
        });

        match trial.run().await {
            Ok(summary) => {
                emitter.emit(Event::TrialCompleted {
                    timestamp: Utc::now(),
                    trial_id: trial.id(),
                    phases: summary.completed.len(),
                    duration_ms: clock::millis(summary.elapsed),
                });
            }
            Err(e) => {
                emitter.emit(Event::TrialFailed {
                    timestamp: Utc::now(),
                    trial_id: trial.id(),
                    phase: e.failed_phase(),
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        }

        let row = serde_json::to_string(&trial.to_table::<&str>(None))?;
        writeln!(stdout, "{row}")?;
    }

    stdout.flush()?;
    info!(trials = session.trials.len(), "session complete");
    Ok(())
}

/// Scripted collector answers for trial `index`: the first response and,
/// for advised sessions, the final response. Lists are cycled; an empty
/// list times out.
fn response_script(
    simulation: &SimulationConfig,
    variant: Variant,
    index: usize,
) -> Vec<Option<Row>> {
    let pick = |responses: &[Option<Row>]| {
        if responses.is_empty() {
            None
        } else {
            responses[index % responses.len()].clone()
        }
    };

    let mut script = vec![pick(&simulation.responses)];
    if variant == Variant::Advised {
        script.push(pick(&simulation.final_responses));
    }
    script
}
