use super::stats::{GateStats, GateStatsSnapshot};
use crate::config::GateConfig;
use crate::events::{EventBus, MoodEvent};
use crate::frame::CameraFrame;
use crate::pipeline::DetectionPipeline;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Whether the user currently has a face framed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceGateState {
    #[default]
    Initial,
    FaceDetected,
    NoFaceDetected,
}

impl FaceGateState {
    fn from_presence(has_face: bool) -> Self {
        if has_face {
            FaceGateState::FaceDetected
        } else {
            FaceGateState::NoFaceDetected
        }
    }
}

/// What the gate did with one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Dropped without analysis, inside the analysis interval
    Throttled,
    /// Analyzed and applied to the gate state
    Analyzed(FaceGateState),
    /// Analyzed, but a later analysis had already been applied
    Superseded,
}

/// Throttling filter between the camera and the face presence detector
pub struct FrameGate {
    inner: Arc<GateInner>,
    worker: Mutex<Option<GateWorker>>,
}

struct GateWorker {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct GateInner {
    interval: Duration,
    pipeline: DetectionPipeline,
    last_analysis: Mutex<Option<Instant>>,
    /// Sequence of the latest analysis started
    started: AtomicU64,
    /// Sequence of the latest analysis applied; also guards state updates
    applied: Mutex<u64>,
    state_tx: watch::Sender<FaceGateState>,
    event_bus: Option<EventBus>,
    stats: GateStats,
}

impl FrameGate {
    pub fn new(config: &GateConfig, pipeline: DetectionPipeline) -> Self {
        let (state_tx, _) = watch::channel(FaceGateState::Initial);
        Self {
            inner: Arc::new(GateInner {
                interval: config.analysis_interval(),
                pipeline,
                last_analysis: Mutex::new(None),
                started: AtomicU64::new(0),
                applied: Mutex::new(0),
                state_tx,
                event_bus: None,
                stats: GateStats::default(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Publish `FaceGateChanged` events on `event_bus`. Call before `start`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.event_bus = Some(event_bus);
        } else {
            warn!("Frame gate already shared, event bus not attached");
        }
        self
    }

    pub fn state(&self) -> FaceGateState {
        *self.inner.state_tx.borrow()
    }

    /// Watch gate state; the current state is visible immediately
    pub fn subscribe_state(&self) -> watch::Receiver<FaceGateState> {
        self.inner.state_tx.subscribe()
    }

    /// The capture action is enabled only while a face is framed
    pub fn is_capture_enabled(&self) -> bool {
        self.state() == FaceGateState::FaceDetected
    }

    pub fn analysis_interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn stats(&self) -> GateStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Run one frame through the gate
    pub async fn process_frame(&self, frame: CameraFrame) -> GateDecision {
        self.inner.process_frame(frame).await
    }

    /// Consume frames from `frames` on a background task until `stop` is
    /// called or the sender side closes
    pub fn start(&self, mut frames: mpsc::Receiver<CameraFrame>) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            warn!("Frame gate is already running");
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let inner = Arc::clone(&self.inner);

        let task = tokio::spawn(async move {
            info!("Frame gate started ({:?} interval)", inner.interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = frames.recv() => match next {
                        Some(frame) => {
                            inner.process_frame(frame).await;
                        }
                        None => {
                            debug!("Frame source closed");
                            break;
                        }
                    },
                }
            }
            info!("Frame gate stopped");
        });

        *worker = Some(GateWorker { cancel, task });
    }

    /// Stop the background task started by `start` and wait for it to end
    pub async fn stop(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
            if let Err(e) = worker.task.await {
                warn!("Frame gate task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for FrameGate {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
        }
    }
}

impl GateInner {
    async fn process_frame(&self, frame: CameraFrame) -> GateDecision {
        GateStats::bump(&self.stats.frames_seen);

        let sequence = {
            let mut last = self.last_analysis.lock();
            if let Some(previous) = *last {
                if frame.captured_at.saturating_duration_since(previous) < self.interval {
                    GateStats::bump(&self.stats.frames_throttled);
                    return GateDecision::Throttled;
                }
            }
            *last = Some(frame.captured_at);
            self.started.fetch_add(1, Ordering::SeqCst) + 1
        };

        GateStats::bump(&self.stats.frames_analyzed);
        let frame_id = frame.id;
        let verdict = match self.pipeline.check_face_presence(frame).await {
            Ok(has_face) => FaceGateState::from_presence(has_face),
            Err(e) => {
                GateStats::bump(&self.stats.presence_failures);
                warn!("Presence check on frame {} failed, treating as no face: {}", frame_id, e);
                FaceGateState::NoFaceDetected
            }
        };

        let mut applied = self.applied.lock();
        if sequence < *applied {
            GateStats::bump(&self.stats.stale_decisions);
            debug!("Dropping stale gate decision for frame {}", frame_id);
            return GateDecision::Superseded;
        }
        *applied = sequence;

        let changed = self.state_tx.send_if_modified(|state| {
            if *state == verdict {
                false
            } else {
                *state = verdict;
                true
            }
        });
        drop(applied);

        if changed {
            debug!("Face gate now {:?}", verdict);
            if let Some(bus) = &self.event_bus {
                bus.notify(MoodEvent::FaceGateChanged {
                    state: verdict,
                    timestamp: SystemTime::now(),
                });
            }
        }

        GateDecision::Analyzed(verdict)
    }
}
