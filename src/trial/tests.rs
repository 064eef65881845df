use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;

use super::*;
use crate::clock::TokioClock;
use crate::config::schema::{CorrectAnswer, Durations};
use crate::error::CollaboratorError;
use crate::phase::{PhaseFuture, PhaseOp};
use crate::record::{FieldKey, Scalar};
use crate::sim::{DelayFeedback, ScriptedAdvisor, ScriptedCollector, TracingScreen};

fn row(pairs: &[(&str, Scalar)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn quick(stimulus: &str) -> TrialConfig {
    TrialConfig::new(stimulus).with_durations(Durations::immediate())
}

struct Fixture {
    collector: Arc<ScriptedCollector>,
    screen: Arc<TracingScreen>,
}

impl Fixture {
    fn new(script: Vec<Option<Row>>) -> Self {
        Self {
            collector: Arc::new(ScriptedCollector::new(script)),
            screen: Arc::new(TracingScreen::default()),
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators::new(self.collector.clone(), self.screen.clone())
    }
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_record_seeded_at_construction() {
    let fx = Fixture::new(Vec::new());
    let trial = Trial::base(
        quick("dots").with_correct_answer(Scalar::Int(42)).with_number(3).with_attention_check(true),
        fx.collaborators(),
    )
    .unwrap();

    assert_eq!(
        trial.table_headers(),
        vec![
            "timestampStart",
            "timeStimOn",
            "timeStimOff",
            "timeResponseOpen",
            "timeResponseClose",
            "timeFeedbackOn",
            "timeFeedbackOff",
            "timeEnd",
            "stimulus",
            "correctAnswer",
            "number",
            "isAttentionCheck",
        ]
    );
    let table = trial.to_table::<&str>(None);
    assert_eq!(table["timestampStart"], Scalar::Null);
    assert_eq!(table["correctAnswer"], Scalar::Int(42));
    assert_eq!(table["number"], Scalar::Int(3));
    assert_eq!(table["isAttentionCheck"], Scalar::Int(1));
    assert_eq!(trial.status(), TrialStatus::Pending);
    assert_eq!(fx.screen.reset_count(), 1);
}

#[test]
fn test_advised_seeds_final_response_times() {
    let fx = Fixture::new(Vec::new());
    let trial = Trial::advised(quick("dots"), fx.collaborators()).unwrap();
    let headers = trial.table_headers();
    assert!(headers.contains(&"timeResponseOpenFinal".to_string()));
    assert!(headers.contains(&"timeResponseCloseFinal".to_string()));
}

#[test]
fn test_computed_correct_answer_evaluated_once() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let answer = CorrectAnswer::computed(move || {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Scalar::from("right")
    });
    let fx = Fixture::new(Vec::new());
    let trial = Trial::base(quick("dots").with_correct_answer(answer), fx.collaborators()).unwrap();

    assert_eq!(trial.view().correct_answer, &Scalar::from("right"));
    let _ = trial.to_table::<&str>(None);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn test_prompt_for_unknown_phase_rejected() {
    let mut prompt = IndexMap::new();
    prompt.insert(PhaseName::ShowAdvice, "Consider".to_string());
    let fx = Fixture::new(Vec::new());
    let err = Trial::base(quick("dots").with_prompt(PromptSpec::PerPhase(prompt)), fx.collaborators())
        .unwrap_err();
    assert!(matches!(
        err,
        TrialKitError::Config(ConfigError::InvalidValue { ref value, .. }) if value == "showAdvice"
    ));
}

// ============================================================================
// Prompts
// ============================================================================

#[test]
fn test_base_prompt_replicated() {
    let fx = Fixture::new(Vec::new());
    let trial = Trial::base(
        quick("dots").with_prompt(PromptSpec::Shared("Which side?".to_string())),
        fx.collaborators(),
    )
    .unwrap();
    assert_eq!(trial.prompts().len(), 7);
    assert!(trial.prompts().iter().all(|(_, p)| p == "Which side?"));
}

#[test]
fn test_advised_prompt_expansion() {
    let fx = Fixture::new(Vec::new());
    let trial = Trial::advised(
        quick("dots").with_prompt(PromptSpec::Shared("Which side?".to_string())),
        fx.collaborators(),
    )
    .unwrap();
    let prompts = trial.prompts();
    assert_eq!(prompts.len(), 9);
    for phase in [
        PhaseName::Begin,
        PhaseName::ShowStim,
        PhaseName::HideStim,
        PhaseName::GetResponse,
    ] {
        assert_eq!(prompts.get(phase), "Which side?");
    }
    for phase in [
        PhaseName::ShowAdvice,
        PhaseName::GetFinalResponse,
        PhaseName::ShowFeedback,
    ] {
        assert_eq!(prompts.get(phase), ADVICE_PROMPT);
    }
    assert_eq!(prompts.get(PhaseName::End), "");
    assert_eq!(prompts.get(PhaseName::Cleanup), "");
}

#[tokio::test(start_paused = true)]
async fn test_prompt_set_on_screen_before_each_phase() {
    let mut prompt = IndexMap::new();
    prompt.insert(PhaseName::Begin, "Ready".to_string());
    prompt.insert(PhaseName::GetResponse, "Answer".to_string());
    let fx = Fixture::new(vec![Some(row(&[("value", Scalar::Int(1))]))]);
    let mut trial = Trial::base(
        quick("dots").with_prompt(PromptSpec::PerPhase(prompt)),
        fx.collaborators(),
    )
    .unwrap();
    trial.run().await.unwrap();

    assert_eq!(
        fx.screen.prompt_history(),
        vec!["Ready", "", "", "Answer", "", "", ""]
    );
    assert_eq!(trial.active_phase(), Some(PhaseName::Cleanup));
}

// ============================================================================
// Run
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_run_twice_rejected() {
    let fx = Fixture::new(vec![None]);
    let mut trial = Trial::base(quick("dots"), fx.collaborators()).unwrap();
    trial.run().await.unwrap();
    assert_eq!(trial.status(), TrialStatus::Complete);

    let err = trial.run().await.unwrap_err();
    assert!(matches!(err, PhaseError::AlreadyRun(ref id) if *id == trial.id().to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_durations_drive_timestamps() {
    let fx = Fixture::new(vec![Some(row(&[("value", Scalar::Int(1))]))]);
    let config = TrialConfig::new("dots").with_durations(Durations {
        pre_stim: Some(500),
        stim: Some(300),
        post_stim: Some(100),
        ..Durations::immediate()
    });
    let mut trial = Trial::base(config, fx.collaborators())
        .unwrap()
        .with_clock(Arc::new(TokioClock::new()));
    trial.run().await.unwrap();

    let record = trial.record();
    assert_eq!(record.get_column("timeStimOn"), Some(&Scalar::Int(500)));
    assert_eq!(record.get_column("timeStimOff"), Some(&Scalar::Int(800)));
    assert_eq!(record.get_column("timeResponseOpen"), Some(&Scalar::Int(900)));
    assert_eq!(record.get_column("timeEnd"), Some(&Scalar::Int(900)));
}

#[tokio::test(start_paused = true)]
async fn test_stimulus_and_blank_shown() {
    let fx = Fixture::new(vec![None]);
    let mut trial = Trial::base(quick("dots").with_blank_stimulus("mask"), fx.collaborators())
        .unwrap();

    let screen = Arc::clone(&fx.screen);
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer = crate::phase::CallbackObserver(move |phase: PhaseName, _trial: &Trial| {
        sink.lock().unwrap().push((phase, screen.stimulus()));
    });
    trial = trial.with_observer(Arc::new(observer));
    trial.run().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[1], (PhaseName::ShowStim, "dots".to_string()));
    assert_eq!(seen[3], (PhaseName::GetResponse, "mask".to_string()));
    // cleanup resets the display once more
    assert_eq!(fx.screen.stimulus(), "");
    assert_eq!(fx.screen.reset_count(), 2);
    assert_eq!(fx.collector.reset_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_feedback_phase_times_recorded() {
    let fx = Fixture::new(vec![Some(row(&[("value", Scalar::Int(1))]))]);
    let feedback = Arc::new(DelayFeedback::new(Duration::from_millis(400)));
    let mut trial = Trial::base(quick("dots"), fx.collaborators().with_feedback(feedback.clone()))
        .unwrap()
        .with_clock(Arc::new(TokioClock::new()));
    trial.run().await.unwrap();

    assert_eq!(feedback.calls(), 1);
    let on = trial.record().get_column("timeFeedbackOn").and_then(Scalar::as_i64).unwrap();
    let off = trial.record().get_column("timeFeedbackOff").and_then(Scalar::as_i64).unwrap();
    assert_eq!(off - on, 400);
}

#[tokio::test(start_paused = true)]
async fn test_display_failure_stops_at_begin() {
    let collector = Arc::new(ScriptedCollector::new(Vec::new()));
    let collaborators = Collaborators::new(collector, Arc::new(TracingScreen::broken()));
    let mut trial = Trial::base(quick("dots"), collaborators).unwrap();

    let err = trial.run().await.unwrap_err();
    assert_eq!(err.failed_phase(), Some(PhaseName::Begin));
    assert_eq!(trial.status(), TrialStatus::Failed);
    assert_eq!(trial.record().timestamp_start(), None);
}

#[tokio::test(start_paused = true)]
async fn test_advisor_failure_wrapped_with_index() {
    let fx = Fixture::new(vec![Some(row(&[("value", Scalar::Int(1))]))]);
    let good = Arc::new(ScriptedAdvisor::new("a", Row::new(), row(&[("x", Scalar::Int(1))])));
    let bad = Arc::new(ScriptedAdvisor::failing("b", "no advice"));
    let collaborators = fx.collaborators().with_advisor(good.clone()).with_advisor(bad);
    let mut trial = Trial::advised(quick("dots"), collaborators).unwrap();

    let err = trial.run().await.unwrap_err();
    let PhaseError::Failed {
        phase,
        source: CollaboratorError::Advisor { index, message },
    } = &err
    else {
        panic!("expected advisor failure, got {err:?}");
    };
    assert_eq!(*phase, PhaseName::ShowAdvice);
    assert_eq!(*index, 1);
    assert_eq!(message, "no advice");
    assert_eq!(good.drawn(), 1);
    // cleanup never ran
    assert_eq!(good.hidden(), 0);
    assert_eq!(trial.record().get_column("timeResponseOpenFinal"), Some(&Scalar::Null));
}

#[tokio::test(start_paused = true)]
async fn test_final_response_not_reset_and_inherits_timeout() {
    let fx = Fixture::new(vec![
        Some(row(&[("value", Scalar::Int(1))])),
        Some(row(&[("value", Scalar::Int(2))])),
    ]);
    let config = quick("dots").with_durations(Durations {
        response: Some(3000),
        ..Durations::immediate()
    });
    let mut trial = Trial::advised(config, fx.collaborators()).unwrap();
    trial.run().await.unwrap();

    assert_eq!(
        fx.collector.requests(),
        vec![
            (Some(Duration::from_millis(3000)), true),
            (Some(Duration::from_millis(3000)), false),
        ]
    );
}

// ============================================================================
// Custom behaviours
// ============================================================================

fn mark(trial: &mut Trial) -> PhaseFuture<'_> {
    trial.record.set(FieldKey::trial("marked"), true);
    Box::pin(std::future::ready(Ok::<(), CollaboratorError>(())))
}

#[tokio::test(start_paused = true)]
async fn test_custom_behavior_extends_base() {
    let behavior = base_behavior()
        .unwrap()
        .extend("marked")
        .replace(PhaseName::ShowFeedback, mark as PhaseOp<Trial>)
        .seed_fields(&["marked"])
        .build()
        .unwrap();
    let fx = Fixture::new(vec![None]);
    let mut trial =
        Trial::with_behavior(Arc::new(behavior), quick("dots"), fx.collaborators()).unwrap();
    assert_eq!(trial.record().get_column("marked"), Some(&Scalar::Null));

    let summary = trial.run().await.unwrap();
    assert_eq!(summary.behavior, "marked");
    assert_eq!(trial.record().get_column("marked"), Some(&Scalar::Bool(true)));
}
