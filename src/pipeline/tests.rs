use super::*;
use crate::aggregation::AggregationEngine;
use crate::config::PipelineConfig;
use crate::error::{ClassificationError, PipelineError};
use crate::frame::{CameraFrame, CapturedImage, FrameFormat};
use crate::model::{EmotionLabel, EmotionScores};
use crate::ports::{
    FixedClock, IdPort, PortProbe, ScriptedClassifier, ScriptedPresence, SequentialIds,
};
use chrono::{NaiveDate, NaiveTime};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};

fn test_config() -> PipelineConfig {
    PipelineConfig {
        saved_display_delay_ms: 50,
        classification_timeout_ms: 0,
    }
}

fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 14).unwrap()
}

fn test_time() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 45, 0).unwrap()
}

fn joy_scores() -> EmotionScores {
    EmotionScores::new()
        .with(EmotionLabel::Joy, 0.9)
        .with(EmotionLabel::Neutral, 0.1)
}

fn image() -> CapturedImage {
    CapturedImage::new(vec![10u8, 20, 30, 40], 2, 2, FrameFormat::Jpeg)
}

fn frame(id: u64) -> CameraFrame {
    CameraFrame::new(id, Instant::now(), vec![0u8; 4], 1, 1, FrameFormat::Rgba8)
}

fn pipeline_with(classifier: ScriptedClassifier) -> DetectionPipeline {
    DetectionPipeline::builder()
        .config(test_config())
        .classifier(classifier)
        .face_presence(ScriptedPresence::always(true))
        .clock(Arc::new(FixedClock::new(test_date(), test_time())))
        .ids(Arc::new(SequentialIds::new("entry")))
        .build()
        .unwrap()
}

async fn wait_for_state<F>(pipeline: &DetectionPipeline, predicate: F) -> PipelineState
where
    F: FnMut(&PipelineState) -> bool,
{
    let mut receiver = pipeline.subscribe_state();
    let state = match timeout(Duration::from_secs(2), receiver.wait_for(predicate)).await {
        Ok(Ok(state)) => state.clone(),
        Ok(Err(_)) => panic!("state channel closed"),
        Err(_) => panic!("timed out waiting for state, last: {}", pipeline.state()),
    };
    state
}

async fn wait_for_calls(probe: &PortProbe, calls: usize) {
    let reached = timeout(Duration::from_secs(2), async {
        while probe.calls() < calls {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "classifier never reached {} calls", calls);
}

#[tokio::test]
async fn test_successful_classification() {
    let pipeline = pipeline_with(ScriptedClassifier::new(vec![Ok(joy_scores())]));
    assert_eq!(pipeline.state(), PipelineState::Initial);

    let outcome = pipeline.request_classification(image()).unwrap();
    assert!(outcome.is_started());
    outcome.wait().await;

    match pipeline.state() {
        PipelineState::Success(result) => {
            assert_eq!(result.dominant_emotion, EmotionLabel::Joy);
            assert_eq!(result.scores, joy_scores());
        }
        other => panic!("Unexpected state: {}", other),
    }
    assert!(!pipeline.is_degraded());
    assert_eq!(pipeline.stats().classifications_completed, 1);
}

#[tokio::test]
async fn test_image_ref_is_carried_into_result() {
    let pipeline = pipeline_with(ScriptedClassifier::new(vec![Ok(joy_scores())]));
    let capture = image().with_storage_ref("captures/001.jpg");

    pipeline.request_classification(capture).unwrap().wait().await;

    let entry = pipeline.confirm_save(Vec::<String>::new(), "", "u1").unwrap();
    assert_eq!(entry.captured_image_path(), Some("captures/001.jpg"));
}

#[tokio::test]
async fn test_second_request_while_loading_is_ignored() {
    let (release, hold) = mpsc::channel();
    let classifier = ScriptedClassifier::new(vec![Ok(joy_scores()), Ok(joy_scores())]).held(hold);
    let probe = classifier.probe();
    let pipeline = pipeline_with(classifier);

    let first = pipeline.request_classification(image()).unwrap();
    assert!(pipeline.state().is_loading());

    let second = pipeline.request_classification(image()).unwrap();
    assert!(matches!(second, RequestOutcome::Ignored { state: "Loading" }));
    assert!(pipeline.state().is_loading());

    release.send(()).unwrap();
    first.wait().await;

    assert_eq!(probe.calls(), 1);
    assert_eq!(probe.max_concurrent(), 1);
    assert_eq!(pipeline.stats().requests_ignored, 1);
    assert!(matches!(pipeline.state(), PipelineState::Success(_)));
}

#[tokio::test]
async fn test_reset_discards_late_result() {
    let (release, hold) = mpsc::channel();
    let classifier = ScriptedClassifier::new(vec![Ok(joy_scores())]).held(hold);
    let pipeline = pipeline_with(classifier);

    let outcome = pipeline.request_classification(image()).unwrap();
    pipeline.reset();
    assert_eq!(pipeline.state(), PipelineState::Initial);

    release.send(()).unwrap();
    outcome.wait().await;

    assert_eq!(pipeline.state(), PipelineState::Initial);
    assert_eq!(pipeline.stats().stale_results_discarded, 1);
}

#[tokio::test]
async fn test_late_result_does_not_override_next_generation() {
    let (release, hold) = mpsc::channel();
    let sad = EmotionScores::new().with(EmotionLabel::Sadness, 0.8);
    let classifier = ScriptedClassifier::new(vec![Ok(sad), Ok(joy_scores())]).held(hold);
    let probe = classifier.probe();
    let pipeline = pipeline_with(classifier);

    let stale = pipeline.request_classification(image()).unwrap();
    wait_for_calls(&probe, 1).await;
    pipeline.reset();
    let fresh = pipeline.request_classification(image()).unwrap();
    assert_eq!(stale.generation().map(|g| g + 1), fresh.generation());

    release.send(()).unwrap();
    release.send(()).unwrap();
    stale.wait().await;
    fresh.wait().await;

    // Both native calls ran, never at the same time
    assert_eq!(probe.calls(), 2);
    assert_eq!(probe.max_concurrent(), 1);
    match pipeline.state() {
        PipelineState::Success(result) => assert_eq!(result.dominant_emotion, EmotionLabel::Joy),
        other => panic!("Unexpected state: {}", other),
    }
    assert_eq!(pipeline.stats().stale_results_discarded, 1);
}

#[tokio::test]
async fn test_classifier_failure_then_reset() {
    let pipeline = pipeline_with(ScriptedClassifier::new(vec![Err(
        ClassificationError::ModelFault {
            details: "tensor shape mismatch".to_string(),
        },
    )]));

    pipeline.request_classification(image()).unwrap().wait().await;

    match pipeline.state() {
        PipelineState::Error { message, retained } => {
            assert!(message.contains("tensor shape mismatch"));
            assert!(retained.is_none());
        }
        other => panic!("Unexpected state: {}", other),
    }

    pipeline.reset();
    assert_eq!(pipeline.state(), PipelineState::Initial);
    assert_eq!(pipeline.stats().classifications_failed, 1);
}

#[tokio::test]
async fn test_empty_scores_become_error() {
    let pipeline = pipeline_with(ScriptedClassifier::new(vec![Ok(EmotionScores::new())]));
    pipeline.request_classification(image()).unwrap().wait().await;

    assert!(matches!(pipeline.state(), PipelineState::Error { .. }));
}

#[tokio::test]
async fn test_retry_from_error_is_allowed() {
    let pipeline = pipeline_with(ScriptedClassifier::new(vec![
        Err(ClassificationError::MalformedInput {
            details: "blurry".to_string(),
        }),
        Ok(joy_scores()),
    ]));

    pipeline.request_classification(image()).unwrap().wait().await;
    assert!(matches!(pipeline.state(), PipelineState::Error { .. }));

    let retry = pipeline.request_classification(image()).unwrap();
    assert!(retry.is_started());
    retry.wait().await;
    assert!(matches!(pipeline.state(), PipelineState::Success(_)));
}

#[tokio::test]
async fn test_confirm_save_in_initial_is_rejected() {
    let pipeline = pipeline_with(ScriptedClassifier::new(Vec::new()));

    let result = pipeline.confirm_save(["work"], "note", "u1");
    assert!(matches!(result, Err(PipelineError::InvalidState { .. })));
    assert_eq!(pipeline.state(), PipelineState::Initial);
    assert_eq!(pipeline.engine().entry_count(), 0);
}

#[tokio::test]
async fn test_confirm_save_creates_entry_then_returns_to_initial() {
    let pipeline = pipeline_with(ScriptedClassifier::new(vec![Ok(joy_scores())]));
    pipeline.request_classification(image()).unwrap().wait().await;

    let entry = pipeline
        .confirm_save(["family", "outdoors"], "Picnic", "user-42")
        .unwrap();

    assert_eq!(entry.id(), "entry-1");
    assert_eq!(entry.date(), test_date());
    assert_eq!(entry.time(), test_time());
    assert_eq!(entry.dominant_emotion(), EmotionLabel::Joy);
    assert_eq!(entry.mood_note(), "Picnic");
    assert_eq!(entry.user_id(), "user-42");
    assert!(entry.context_tags().contains("outdoors"));
    assert_eq!(pipeline.state(), PipelineState::Saved(entry.clone()));

    let stored = pipeline.engine().get_entries_for_date(test_date());
    assert_eq!(stored, vec![entry]);

    let state = wait_for_state(&pipeline, |s| *s == PipelineState::Initial).await;
    assert_eq!(state, PipelineState::Initial);
    assert_eq!(pipeline.stats().entries_saved, 1);
}

#[tokio::test]
async fn test_request_while_saved_is_ignored() {
    let pipeline = pipeline_with(ScriptedClassifier::new(vec![Ok(joy_scores())]));
    pipeline.request_classification(image()).unwrap().wait().await;
    pipeline.confirm_save(Vec::<String>::new(), "", "u1").unwrap();

    let outcome = pipeline.request_classification(image()).unwrap();
    assert!(matches!(outcome, RequestOutcome::Ignored { state: "Saved" }));
}

#[tokio::test]
async fn test_reset_during_saved_cancels_delayed_return() {
    let pipeline = pipeline_with(ScriptedClassifier::new(vec![
        Ok(joy_scores()),
        Ok(joy_scores()),
    ]));
    pipeline.request_classification(image()).unwrap().wait().await;
    pipeline.confirm_save(Vec::<String>::new(), "", "u1").unwrap();

    pipeline.reset();
    pipeline.request_classification(image()).unwrap().wait().await;

    // Outlive the display delay; the old timer must not clobber Success
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(matches!(pipeline.state(), PipelineState::Success(_)));
}

struct QueuedIds(Mutex<VecDeque<&'static str>>);

impl IdPort for QueuedIds {
    fn new_id(&self) -> String {
        self.0.lock().pop_front().unwrap_or("spare").to_string()
    }
}

#[tokio::test]
async fn test_failed_save_keeps_result_for_retry() {
    let engine = Arc::new(AggregationEngine::new());
    let pipeline = DetectionPipeline::builder()
        .config(test_config())
        .classifier(ScriptedClassifier::new(vec![Ok(joy_scores()), Ok(joy_scores())]))
        .face_presence(ScriptedPresence::always(true))
        .engine(Arc::clone(&engine))
        .clock(Arc::new(FixedClock::new(test_date(), test_time())))
        .ids(Arc::new(QueuedIds(Mutex::new(VecDeque::from(vec![
            "dup", "dup", "fresh",
        ])))))
        .build()
        .unwrap();

    pipeline.request_classification(image()).unwrap().wait().await;
    pipeline.confirm_save(Vec::<String>::new(), "", "u1").unwrap();
    wait_for_state(&pipeline, |s| *s == PipelineState::Initial).await;

    pipeline.request_classification(image()).unwrap().wait().await;
    let failed = pipeline.confirm_save(Vec::<String>::new(), "", "u1");
    assert!(matches!(failed, Err(PipelineError::SaveFailed { .. })));

    match pipeline.state() {
        PipelineState::Error { message, retained } => {
            assert!(message.contains("dup"));
            assert_eq!(retained.unwrap().dominant_emotion, EmotionLabel::Joy);
        }
        other => panic!("Unexpected state: {}", other),
    }

    let retried = pipeline.confirm_save(Vec::<String>::new(), "", "u1").unwrap();
    assert_eq!(retried.id(), "fresh");
    assert_eq!(engine.entry_count(), 2);
    assert_eq!(pipeline.stats().saves_failed, 1);
}

#[tokio::test]
async fn test_classifier_load_failure_degrades() {
    let pipeline = DetectionPipeline::builder()
        .config(test_config())
        .classifier_factory(|| {
            Err(ClassificationError::ModelUnavailable {
                details: "model.tflite missing".to_string(),
            })
        })
        .face_presence(ScriptedPresence::always(true))
        .build()
        .unwrap();

    assert!(pipeline.is_degraded());

    pipeline.request_classification(image()).unwrap().wait().await;
    let first = pipeline.state();
    assert!(matches!(first, PipelineState::Success(_)));

    pipeline.reset();
    pipeline.request_classification(image()).unwrap().wait().await;
    assert_eq!(pipeline.state(), first);
}

#[tokio::test]
async fn test_builder_requires_face_presence() {
    let result = DetectionPipeline::builder()
        .classifier(ScriptedClassifier::new(Vec::new()))
        .build();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_classification_timeout() {
    let (release, hold) = mpsc::channel();
    let pipeline = DetectionPipeline::builder()
        .config(PipelineConfig {
            saved_display_delay_ms: 50,
            classification_timeout_ms: 50,
        })
        .classifier(ScriptedClassifier::new(vec![Ok(joy_scores())]).held(hold))
        .face_presence(ScriptedPresence::always(true))
        .build()
        .unwrap();

    pipeline.request_classification(image()).unwrap().wait().await;

    match pipeline.state() {
        PipelineState::Error { message, .. } => assert!(message.contains("timed out")),
        other => panic!("Unexpected state: {}", other),
    }

    // Unblock the abandoned native call
    release.send(()).unwrap();
}

#[tokio::test]
async fn test_request_after_timeout_waits_for_abandoned_call() {
    let (release, hold) = mpsc::channel();
    let sad = EmotionScores::new().with(EmotionLabel::Sadness, 0.8);
    let classifier = ScriptedClassifier::new(vec![Ok(sad), Ok(joy_scores())]).held(hold);
    let probe = classifier.probe();
    let pipeline = DetectionPipeline::builder()
        .config(PipelineConfig {
            saved_display_delay_ms: 50,
            classification_timeout_ms: 100,
        })
        .classifier(classifier)
        .face_presence(ScriptedPresence::always(true))
        .build()
        .unwrap();

    pipeline.request_classification(image()).unwrap().wait().await;
    assert!(matches!(pipeline.state(), PipelineState::Error { .. }));

    // The timed out call still holds the classifier
    let retry = pipeline.request_classification(image()).unwrap();
    assert!(retry.is_started());
    release.send(()).unwrap();
    release.send(()).unwrap();
    retry.wait().await;

    assert_eq!(probe.calls(), 2);
    assert_eq!(probe.max_concurrent(), 1);
    match pipeline.state() {
        PipelineState::Success(result) => assert_eq!(result.dominant_emotion, EmotionLabel::Joy),
        other => panic!("Unexpected state: {}", other),
    }
}

#[tokio::test]
async fn test_nan_score_is_rejected() {
    let scores = EmotionScores::new()
        .with(EmotionLabel::Sadness, 0.9)
        .with(EmotionLabel::Neutral, f32::NAN);
    let pipeline = pipeline_with(ScriptedClassifier::new(vec![Ok(scores)]));

    pipeline.request_classification(image()).unwrap().wait().await;

    match pipeline.state() {
        PipelineState::Error { message, retained } => {
            assert!(message.contains("NEUTRAL"));
            assert!(retained.is_none());
        }
        other => panic!("Unexpected state: {}", other),
    }
    assert_eq!(pipeline.stats().classifications_failed, 1);
}

#[tokio::test]
async fn test_negative_score_is_never_saved() {
    let negative = EmotionScores::new().with(EmotionLabel::Anger, -5.0);
    let pipeline = pipeline_with(ScriptedClassifier::new(vec![Ok(negative)]));

    pipeline.request_classification(image()).unwrap().wait().await;
    assert!(matches!(pipeline.state(), PipelineState::Error { .. }));

    let saved = pipeline.confirm_save(Vec::<String>::new(), "", "u1");
    assert!(matches!(saved, Err(PipelineError::InvalidState { .. })));
    assert_eq!(pipeline.engine().entry_count(), 0);
}

#[tokio::test]
async fn test_destroy_during_classification_discards_result() {
    let (release, hold) = mpsc::channel();
    let classifier = ScriptedClassifier::new(vec![Ok(joy_scores())]).held(hold);
    let probe = classifier.probe();
    let pipeline = pipeline_with(classifier);

    let in_flight = pipeline.request_classification(image()).unwrap();
    wait_for_calls(&probe, 1).await;

    let destroyer = pipeline.clone();
    let destroy = tokio::spawn(async move { destroyer.prepare_for_destroy().await });
    wait_for_state(&pipeline, |s| *s == PipelineState::Initial).await;
    assert!(matches!(
        pipeline.request_classification(image()),
        Err(PipelineError::ResourceReleased)
    ));

    // Closing waits for the running call to return
    release.send(()).unwrap();
    in_flight.wait().await;
    assert!(destroy.await.unwrap());

    assert_eq!(pipeline.state(), PipelineState::Initial);
    assert_eq!(pipeline.stats().stale_results_discarded, 1);
    assert!(probe.is_closed());
}

#[tokio::test]
async fn test_pause_keeps_resources_across_teardown() {
    let classifier = ScriptedClassifier::new(vec![Ok(joy_scores())]);
    let classifier_probe = classifier.probe();
    let pipeline = pipeline_with(classifier);
    assert_eq!(pipeline.lifecycle(), ResourceLifecycle::Active);

    pipeline.prepare_for_pause();
    assert_eq!(pipeline.lifecycle(), ResourceLifecycle::Suspended);
    assert!(!pipeline.teardown().await);
    assert!(!classifier_probe.is_closed());

    pipeline.prepare_for_resume();
    assert_eq!(pipeline.lifecycle(), ResourceLifecycle::Active);
    pipeline.request_classification(image()).unwrap().wait().await;
    assert!(matches!(pipeline.state(), PipelineState::Success(_)));

    assert!(pipeline.teardown().await);
    assert_eq!(pipeline.lifecycle(), ResourceLifecycle::Released);
    assert!(classifier_probe.is_closed());
}

#[tokio::test]
async fn test_destroy_releases_and_fails_fast_afterwards() {
    let presence = ScriptedPresence::always(true);
    let presence_probe = presence.probe();
    let classifier = ScriptedClassifier::new(Vec::new());
    let classifier_probe = classifier.probe();
    let pipeline = DetectionPipeline::builder()
        .config(test_config())
        .classifier(classifier)
        .face_presence(presence)
        .build()
        .unwrap();

    pipeline.prepare_for_pause();
    assert!(pipeline.prepare_for_destroy().await);
    assert_eq!(pipeline.lifecycle(), ResourceLifecycle::Released);
    assert!(classifier_probe.is_closed());
    assert!(presence_probe.is_closed());

    assert!(matches!(
        pipeline.request_classification(image()),
        Err(PipelineError::ResourceReleased)
    ));
    assert!(matches!(
        pipeline.check_face_presence(frame(1)).await,
        Err(PipelineError::ResourceReleased)
    ));

    // Releasing twice is harmless
    assert!(!pipeline.prepare_for_destroy().await);
    assert!(!pipeline.teardown().await);
}

#[tokio::test]
async fn test_face_presence_check() {
    let pipeline = DetectionPipeline::builder()
        .config(test_config())
        .classifier(ScriptedClassifier::new(Vec::new()))
        .face_presence(ScriptedPresence::new(
            vec![Ok(false), Err(crate::error::PresenceError::CheckFailed {
                details: "no landmarks".to_string(),
            })],
            true,
        ))
        .build()
        .unwrap();

    assert_eq!(pipeline.check_face_presence(frame(1)).await, Ok(false));
    assert!(matches!(
        pipeline.check_face_presence(frame(2)).await,
        Err(PipelineError::PresenceCheckFailed(_))
    ));
    assert_eq!(pipeline.check_face_presence(frame(3)).await, Ok(true));
}

#[tokio::test]
async fn test_state_stream_starts_with_latest_value() {
    let pipeline = pipeline_with(ScriptedClassifier::new(vec![Ok(joy_scores())]));
    pipeline.request_classification(image()).unwrap().wait().await;

    let receiver = pipeline.subscribe_state();
    assert!(matches!(*receiver.borrow(), PipelineState::Success(_)));
}
