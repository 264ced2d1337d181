use super::lifecycle::{ModelResources, ResourceLifecycle, ResourceSlot, SharedClassifier};
use super::state::{ClassificationResult, PipelineState};
use super::stats::{PipelineStats, PipelineStatsSnapshot};
use crate::aggregation::AggregationEngine;
use crate::config::PipelineConfig;
use crate::error::{ClassificationError, MoodlensError, PipelineError, PresenceError, Result};
use crate::events::{EventBus, MoodEvent};
use crate::frame::{CameraFrame, CapturedImage};
use crate::model::{EmotionEntry, EmotionScores};
use crate::ports::{
    ClassifierFactory, ClassifierPort, ClockPort, FacePresencePort, FallbackClassifier, IdPort,
    SystemClock, UuidIdGenerator,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

/// What happened to a classification request
#[derive(Debug)]
pub enum RequestOutcome {
    /// The request was handed to the classifier
    Started(InFlight),
    /// Dropped without effect because the pipeline was busy
    Ignored { state: &'static str },
}

impl RequestOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, RequestOutcome::Started(_))
    }

    pub fn generation(&self) -> Option<u64> {
        match self {
            RequestOutcome::Started(in_flight) => Some(in_flight.generation),
            RequestOutcome::Ignored { .. } => None,
        }
    }

    /// Wait until the request's result has been applied or discarded
    pub async fn wait(self) {
        if let RequestOutcome::Started(in_flight) = self {
            in_flight.wait().await;
        }
    }
}

/// Handle on an outstanding classification
#[derive(Debug)]
pub struct InFlight {
    generation: u64,
    task: JoinHandle<()>,
}

impl InFlight {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            error!("Classification task #{} ended abnormally: {}", self.generation, e);
        }
    }
}

/// State machine that runs one classification/save cycle at a time.
///
/// Cloning yields another handle on the same pipeline.
#[derive(Clone)]
pub struct DetectionPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    config: PipelineConfig,
    state_tx: watch::Sender<PipelineState>,
    /// Request generation; also the lock every state transition happens under
    generation: Mutex<u64>,
    resources: Mutex<ResourceSlot>,
    engine: Arc<AggregationEngine>,
    clock: Arc<dyn ClockPort>,
    ids: Arc<dyn IdPort>,
    event_bus: Option<EventBus>,
    degraded: bool,
    stats: PipelineStats,
}

impl DetectionPipeline {
    pub fn builder() -> DetectionPipelineBuilder {
        DetectionPipelineBuilder::new()
    }

    /// Current state
    pub fn state(&self) -> PipelineState {
        self.inner.state_tx.borrow().clone()
    }

    /// Watch state transitions; the current state is visible immediately
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.inner.state_tx.subscribe()
    }

    /// Whether the deterministic fallback stands in for the real model
    pub fn is_degraded(&self) -> bool {
        self.inner.degraded
    }

    pub fn lifecycle(&self) -> ResourceLifecycle {
        self.inner.resources.lock().lifecycle()
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn engine(&self) -> Arc<AggregationEngine> {
        Arc::clone(&self.inner.engine)
    }

    /// Start classifying `image`.
    ///
    /// Only one classification is ever outstanding: a request made while
    /// `Loading` (or while a save confirmation is showing) is ignored. Must
    /// be called from within a Tokio runtime.
    pub fn request_classification(
        &self,
        image: CapturedImage,
    ) -> std::result::Result<RequestOutcome, PipelineError> {
        let (generation, classifier) = {
            let mut generation = self.inner.generation.lock();
            // Checked under the generation lock so a concurrent release
            // either wins here or makes this request stale
            let classifier = match self.inner.resources.lock().classifier() {
                Some(classifier) => classifier,
                None => {
                    warn!("Classification requested after model resources were released");
                    return Err(PipelineError::ResourceReleased);
                }
            };

            let current = self.inner.state_tx.borrow().clone();
            if !current.accepts_request() {
                PipelineStats::bump(&self.inner.stats.requests_ignored);
                debug!("Ignoring classification request while {}", current);
                return Ok(RequestOutcome::Ignored {
                    state: current.name(),
                });
            }

            *generation += 1;
            let next = *generation;
            self.inner
                .state_tx
                .send_replace(PipelineState::Loading { generation: next });
            (next, classifier)
        };

        PipelineStats::bump(&self.inner.stats.requests_started);
        info!(
            "Classification #{} started ({}x{} {:?})",
            generation, image.width, image.height, image.format
        );
        self.inner
            .notify(MoodEvent::ClassificationStarted { generation });

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            inner
                .run_classification(generation, classifier, image)
                .await;
        });

        Ok(RequestOutcome::Started(InFlight { generation, task }))
    }

    /// Save the current classification as a journal entry.
    ///
    /// Valid from `Success`, or from an `Error` that kept its result after a
    /// failed save. Elsewhere nothing is created and the state is untouched.
    /// Must be called from within a Tokio runtime, which drives the delayed
    /// return to `Initial`.
    pub fn confirm_save<I, S>(
        &self,
        tags: I,
        note: impl Into<String>,
        user_id: &str,
    ) -> std::result::Result<EmotionEntry, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut generation = self.inner.generation.lock();
        let current = self.inner.state_tx.borrow().clone();
        let result = match current.saveable_result() {
            Some(result) => result.clone(),
            None => {
                debug!("Ignoring save request while {}", current);
                return Err(PipelineError::InvalidState {
                    operation: "confirm_save".to_string(),
                    state: current.name().to_string(),
                });
            }
        };

        let (date, time) = self.inner.clock.now();
        let entry = EmotionEntry::builder(self.inner.ids.new_id(), date, time)
            .dominant_emotion(result.dominant_emotion)
            .emotion_scores(result.scores.clone())
            .context_tags(tags)
            .mood_note(note)
            .captured_image_path(result.image_ref.clone())
            .user_id(user_id)
            .build();

        match self.inner.engine.add_entry(entry.clone()) {
            Ok(summary) => {
                *generation += 1;
                let saved_generation = *generation;
                self.inner
                    .state_tx
                    .send_replace(PipelineState::Saved(entry.clone()));
                drop(generation);

                PipelineStats::bump(&self.inner.stats.entries_saved);
                info!(
                    "Saved {} entry {} ({} entries on {})",
                    entry.dominant_emotion(),
                    entry.id(),
                    summary.entry_count,
                    date
                );
                self.schedule_return_to_initial(saved_generation);
                Ok(entry)
            }
            Err(e) => {
                let failure = PipelineError::SaveFailed {
                    details: e.to_string(),
                };
                self.inner.state_tx.send_replace(PipelineState::Error {
                    message: failure.to_string(),
                    retained: Some(result),
                });
                PipelineStats::bump(&self.inner.stats.saves_failed);
                error!("{}", failure);
                Err(failure)
            }
        }
    }

    /// Return to `Initial` from any state.
    ///
    /// An outstanding classifier call keeps running; its result is dropped
    /// when it arrives.
    pub fn reset(&self) {
        let mut generation = self.inner.generation.lock();
        *generation += 1;
        let previous = self.inner.state_tx.send_replace(PipelineState::Initial);
        debug!("Pipeline reset from {}", previous);
    }

    /// Keep the model loaded across the next teardown
    pub fn prepare_for_pause(&self) {
        if self.inner.resources.lock().suspend() {
            info!("Pipeline paused, model resources retained");
        }
    }

    /// Undo [`prepare_for_pause`](Self::prepare_for_pause)
    pub fn prepare_for_resume(&self) {
        if self.inner.resources.lock().resume() {
            info!("Pipeline resumed");
        }
    }

    /// Release the model resources for good
    pub async fn prepare_for_destroy(&self) -> bool {
        info!("Pipeline destroy requested");
        self.release(true).await
    }

    /// Owner teardown: releases the resources unless the pipeline is paused.
    /// Returns whether anything was released.
    pub async fn teardown(&self) -> bool {
        self.release(false).await
    }

    /// Ask the face presence detector about one frame
    pub async fn check_face_presence(
        &self,
        frame: CameraFrame,
    ) -> std::result::Result<bool, PipelineError> {
        let presence = self
            .inner
            .resources
            .lock()
            .presence()
            .ok_or(PipelineError::ResourceReleased)?;

        let frame_id = frame.id;
        let checked = tokio::task::spawn_blocking(move || presence.lock().has_face(&frame))
            .await
            .map_err(|e| PresenceError::CheckFailed {
                details: e.to_string(),
            })?;

        debug!("Face presence for frame {}: {:?}", frame_id, checked);
        Ok(checked?)
    }

    async fn release(&self, force: bool) -> bool {
        let resources = {
            let mut slot = self.inner.resources.lock();
            match slot.lifecycle() {
                ResourceLifecycle::Active => slot.take_for_release(),
                ResourceLifecycle::Suspended if force => slot.take_for_release(),
                ResourceLifecycle::Suspended => {
                    info!("Teardown while paused, keeping model resources");
                    None
                }
                ResourceLifecycle::Released => None,
            }
        };

        let resources: ModelResources = match resources {
            Some(resources) => resources,
            None => return false,
        };

        // Nothing issued before this point may land afterwards
        {
            let mut generation = self.inner.generation.lock();
            *generation += 1;
            self.inner.state_tx.send_replace(PipelineState::Initial);
        }

        if let Err(e) = tokio::task::spawn_blocking(move || resources.close()).await {
            error!("Closing model resources failed: {}", e);
        }

        info!("Model resources released");
        self.inner.notify(MoodEvent::ResourcesReleased {
            timestamp: SystemTime::now(),
        });
        true
    }

    fn schedule_return_to_initial(&self, saved_generation: u64) {
        let inner = Arc::clone(&self.inner);
        let delay = inner.config.saved_display_delay();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let generation = inner.generation.lock();
            let still_saved = *generation == saved_generation
                && matches!(*inner.state_tx.borrow(), PipelineState::Saved(_));
            if still_saved {
                inner.state_tx.send_replace(PipelineState::Initial);
                debug!("Save confirmation shown for {:?}, back to Initial", delay);
            }
        });
    }
}

impl PipelineInner {
    fn notify(&self, event: MoodEvent) {
        if let Some(bus) = &self.event_bus {
            bus.notify(event);
        }
    }

    async fn run_classification(
        &self,
        generation: u64,
        classifier: SharedClassifier,
        image: CapturedImage,
    ) {
        let image_ref = image.storage_ref.clone();
        let work = tokio::task::spawn_blocking(move || classifier.lock().classify(&image));

        let outcome = match self.config.classification_timeout() {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(joined) => flatten_classification(joined),
                Err(_) => {
                    warn!(
                        "Classification #{} exceeded {:?}; a late result will be ignored",
                        generation, limit
                    );
                    Err("classification timed out".to_string())
                }
            },
            None => flatten_classification(work.await),
        };

        self.complete(generation, outcome, image_ref);
    }

    /// Apply a classification outcome if it still belongs to the current request
    fn complete(
        &self,
        generation: u64,
        outcome: std::result::Result<EmotionScores, String>,
        image_ref: Option<String>,
    ) {
        let current_generation = self.generation.lock();
        let still_current = *current_generation == generation
            && matches!(
                *self.state_tx.borrow(),
                PipelineState::Loading { generation: loading } if loading == generation
            );

        if !still_current {
            drop(current_generation);
            PipelineStats::bump(&self.stats.stale_results_discarded);
            debug!("Discarding stale result of classification #{}", generation);
            self.notify(MoodEvent::StaleResultDiscarded { generation });
            return;
        }

        let dominant = match &outcome {
            Ok(scores) => scores.dominant(),
            Err(_) => None,
        };

        match (outcome, dominant) {
            (Ok(scores), Some(dominant_emotion)) => {
                self.state_tx
                    .send_replace(PipelineState::Success(ClassificationResult {
                        dominant_emotion,
                        scores,
                        image_ref,
                    }));
                PipelineStats::bump(&self.stats.classifications_completed);
                info!(
                    "Classification #{} completed: {}",
                    generation, dominant_emotion
                );
                self.notify(MoodEvent::ClassificationCompleted {
                    generation,
                    dominant_emotion,
                });
            }
            (outcome, _) => {
                let message = match outcome {
                    Err(message) => message,
                    Ok(_) => PipelineError::ClassificationFailed(ClassificationError::EmptyScores)
                        .to_string(),
                };
                self.state_tx.send_replace(PipelineState::Error {
                    message: message.clone(),
                    retained: None,
                });
                PipelineStats::bump(&self.stats.classifications_failed);
                self.notify(MoodEvent::ClassificationFailed {
                    generation,
                    message,
                });
            }
        }
    }
}

fn flatten_classification(
    joined: std::result::Result<std::result::Result<EmotionScores, ClassificationError>, JoinError>,
) -> std::result::Result<EmotionScores, String> {
    match joined {
        Ok(Ok(scores)) => match scores.validate() {
            Ok(()) => Ok(scores),
            Err(e) => Err(PipelineError::ClassificationFailed(e).to_string()),
        },
        Ok(Err(e)) => Err(PipelineError::ClassificationFailed(e).to_string()),
        Err(e) => Err(format!("classifier task aborted: {}", e)),
    }
}

/// Builder for DetectionPipeline
pub struct DetectionPipelineBuilder {
    config: Option<PipelineConfig>,
    classifier_factory: Option<ClassifierFactory>,
    face_presence: Option<Box<dyn FacePresencePort>>,
    engine: Option<Arc<AggregationEngine>>,
    clock: Option<Arc<dyn ClockPort>>,
    ids: Option<Arc<dyn IdPort>>,
    event_bus: Option<EventBus>,
}

impl DetectionPipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            classifier_factory: None,
            face_presence: None,
            engine: None,
            clock: None,
            ids: None,
            event_bus: None,
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the classifier lazily; a failing factory puts the pipeline in
    /// degraded mode instead of failing the build
    pub fn classifier_factory<F>(mut self, factory: F) -> Self
    where
        F: FnOnce() -> std::result::Result<Box<dyn ClassifierPort>, ClassificationError>
            + Send
            + 'static,
    {
        self.classifier_factory = Some(Box::new(factory));
        self
    }

    /// Use an already constructed classifier
    pub fn classifier<C: ClassifierPort + 'static>(self, classifier: C) -> Self {
        self.classifier_factory(move || Ok(Box::new(classifier) as Box<dyn ClassifierPort>))
    }

    pub fn face_presence<P: FacePresencePort + 'static>(mut self, presence: P) -> Self {
        self.face_presence = Some(Box::new(presence));
        self
    }

    pub fn engine(mut self, engine: Arc<AggregationEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn ClockPort>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdPort>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<DetectionPipeline> {
        let presence = self.face_presence.ok_or_else(|| {
            MoodlensError::component(
                "detection_pipeline_builder",
                "Face presence detector is required",
            )
        })?;

        let (classifier, degraded): (Box<dyn ClassifierPort>, bool) =
            match self.classifier_factory {
                Some(factory) => match factory() {
                    Ok(classifier) => {
                        info!("Classifier '{}' loaded", classifier.name());
                        (classifier, false)
                    }
                    Err(e) => {
                        let unavailable = PipelineError::ResourceUnavailable {
                            details: e.to_string(),
                        };
                        warn!("{}; using deterministic fallback classifier", unavailable);
                        (Box::new(FallbackClassifier::new()) as Box<dyn ClassifierPort>, true)
                    }
                },
                None => {
                    warn!("No classifier configured; using deterministic fallback classifier");
                    (Box::new(FallbackClassifier::new()) as Box<dyn ClassifierPort>, true)
                }
            };

        let config = self
            .config
            .unwrap_or_else(|| crate::config::MoodlensConfig::default().pipeline);
        let (state_tx, _) = watch::channel(PipelineState::Initial);

        Ok(DetectionPipeline {
            inner: Arc::new(PipelineInner {
                config,
                state_tx,
                generation: Mutex::new(0),
                resources: Mutex::new(ResourceSlot::Active(ModelResources::new(
                    classifier, presence,
                ))),
                engine: self
                    .engine
                    .unwrap_or_else(|| Arc::new(AggregationEngine::new())),
                clock: self
                    .clock
                    .unwrap_or_else(|| Arc::new(SystemClock::new(chrono_tz::UTC)) as Arc<dyn ClockPort>),
                ids: self
                    .ids
                    .unwrap_or_else(|| Arc::new(UuidIdGenerator) as Arc<dyn IdPort>),
                event_bus: self.event_bus,
                degraded,
                stats: PipelineStats::default(),
            }),
        })
    }
}

impl Default for DetectionPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
