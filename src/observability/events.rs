//! Structured event stream for `trialkit`.
//!
//! Discrete, typed events emitted while trials run. Events are serialized as
//! newline-delimited JSON (JSONL) and carry a monotonically increasing
//! sequence number for ordering.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::phase::{PhaseName, PhaseObserver};
use crate::record::ResponseRound;
use crate::trial::Trial;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a session.
///
/// Serialized with a `"type"` tag so consumers can dispatch on the kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A trial is about to run its first phase.
    TrialStarted {
        /// When the trial started.
        timestamp: DateTime<Utc>,
        /// Trial identifier.
        trial_id: Uuid,
        /// Behaviour name (`"trial"`, `"advised"`).
        behavior: String,
        /// Trial number within the session, if configured.
        number: Option<u64>,
    },

    /// A phase became active.
    PhaseEntered {
        /// When the phase started.
        timestamp: DateTime<Utc>,
        /// Trial identifier.
        trial_id: Uuid,
        /// Phase that was entered.
        phase: PhaseName,
        /// Zero-based position of the phase in the behaviour.
        phase_index: usize,
    },

    /// A phase completed.
    PhaseCompleted {
        /// When the phase completed.
        timestamp: DateTime<Utc>,
        /// Trial identifier.
        trial_id: Uuid,
        /// Phase that completed.
        phase: PhaseName,
        /// Milliseconds since `timestampStart`.
        trial_time_ms: i64,
    },

    /// A response window closed without a response.
    ResponseTimedOut {
        /// When the timeout was observed.
        timestamp: DateTime<Utc>,
        /// Trial identifier.
        trial_id: Uuid,
        /// `"first"` or `"final"`.
        round: String,
    },

    /// Every phase of a trial completed.
    TrialCompleted {
        /// When the trial completed.
        timestamp: DateTime<Utc>,
        /// Trial identifier.
        trial_id: Uuid,
        /// Number of phases executed.
        phases: usize,
        /// Wall time spent running, in milliseconds.
        duration_ms: u64,
    },

    /// A trial stopped because a phase failed.
    TrialFailed {
        /// When the failure was reported.
        timestamp: DateTime<Utc>,
        /// Trial identifier.
        trial_id: Uuid,
        /// Failed phase, when the failure came from a phase operation.
        phase: Option<PhaseName>,
        /// Error description.
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization and I/O failures are dropped; a broken event sink never
/// fails a trial.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock()
            && let Ok(line) = serde_json::to_string(&envelope)
        {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Phase observer that reports every transition of a trial as events.
#[derive(Debug, Clone)]
pub struct EventObserver {
    emitter: Arc<EventEmitter>,
}

impl EventObserver {
    /// Creates an observer writing to `emitter`.
    #[must_use]
    pub const fn new(emitter: Arc<EventEmitter>) -> Self {
        Self { emitter }
    }
}

#[async_trait]
impl PhaseObserver<Trial> for EventObserver {
    async fn on_phase(&self, phase: PhaseName, trial: &Trial) {
        let phase_index = trial
            .behavior()
            .phases()
            .position(|p| p == phase)
            .unwrap_or_default();
        self.emitter.emit(Event::PhaseEntered {
            timestamp: Utc::now(),
            trial_id: trial.id(),
            phase,
            phase_index,
        });
    }

    async fn on_phase_complete(&self, phase: PhaseName, trial: &Trial) {
        self.emitter.emit(Event::PhaseCompleted {
            timestamp: Utc::now(),
            trial_id: trial.id(),
            phase,
            trial_time_ms: trial.trial_time(),
        });

        let round = match phase {
            PhaseName::GetResponse => ResponseRound::First,
            PhaseName::GetFinalResponse => ResponseRound::Final,
            _ => return,
        };
        if trial.timed_out(round) {
            self.emitter.emit(Event::ResponseTimedOut {
                timestamp: Utc::now(),
                trial_id: trial.id(),
                round: match round {
                    ResponseRound::First => "first",
                    ResponseRound::Final => "final",
                }
                .to_owned(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
