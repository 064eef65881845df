//! Metrics collection for `trialkit`.
//!
//! Prometheus-compatible counters and histograms for trials, phases and
//! response timeouts. Label values come from fixed sets (behaviour names,
//! phase identifiers, outcomes) so cardinality stays bounded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::TrialKitError;
use crate::phase::PhaseName;
use crate::record::ResponseRound;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `TrialKitError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), TrialKitError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| TrialKitError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "trialkit_trials_total",
        "Total number of trials run, by behavior and outcome"
    );
    describe_counter!(
        "trialkit_phases_total",
        "Total number of phases executed, by behavior, phase and outcome"
    );
    describe_counter!(
        "trialkit_response_timeouts_total",
        "Total number of response windows that closed without a response"
    );
    describe_histogram!(
        "trialkit_phase_duration_ms",
        "Phase duration in milliseconds"
    );
}

/// Records a finished trial.
pub fn record_trial(behavior: &'static str, outcome: &'static str) {
    counter!("trialkit_trials_total", "behavior" => behavior, "outcome" => outcome).increment(1);
}

/// Records a successfully completed phase and its duration.
pub fn record_phase_completed(behavior: &'static str, phase: PhaseName, elapsed: Duration) {
    counter!(
        "trialkit_phases_total",
        "behavior" => behavior,
        "phase" => phase.as_str(),
        "outcome" => "complete",
    )
    .increment(1);
    histogram!(
        "trialkit_phase_duration_ms",
        "behavior" => behavior,
        "phase" => phase.as_str(),
    )
    .record(elapsed.as_secs_f64() * 1000.0);
}

/// Records a phase whose operation failed.
pub fn record_phase_failed(behavior: &'static str, phase: PhaseName) {
    counter!(
        "trialkit_phases_total",
        "behavior" => behavior,
        "phase" => phase.as_str(),
        "outcome" => "failed",
    )
    .increment(1);
}

/// Records a response window that closed without a response.
pub fn record_response_timeout(behavior: &'static str, round: ResponseRound) {
    let round = match round {
        ResponseRound::First => "first",
        ResponseRound::Final => "final",
    };
    counter!(
        "trialkit_response_timeouts_total",
        "behavior" => behavior,
        "round" => round,
    )
    .increment(1);
}
