//! Scripted port implementations for demos and tests without a camera or model.

use super::{ClassifierPort, FacePresencePort};
use crate::error::{ClassificationError, PresenceError};
use crate::frame::{CameraFrame, CapturedImage};
use crate::model::EmotionScores;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::trace;

/// Shared counters describing how a scripted port has been used
#[derive(Debug, Clone, Default)]
pub struct PortProbe {
    calls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl PortProbe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were ever running at the same time
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Classifier that replays a fixed list of results
pub struct ScriptedClassifier {
    script: VecDeque<Result<EmotionScores, ClassificationError>>,
    hold: Option<Receiver<()>>,
    probe: PortProbe,
}

impl ScriptedClassifier {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Result<EmotionScores, ClassificationError>>,
    {
        Self {
            script: script.into_iter().collect(),
            hold: None,
            probe: PortProbe::default(),
        }
    }

    /// Make every call wait for one token on `hold` before answering.
    /// A disconnected channel lets calls through immediately.
    pub fn held(mut self, hold: Receiver<()>) -> Self {
        self.hold = Some(hold);
        self
    }

    pub fn probe(&self) -> PortProbe {
        self.probe.clone()
    }
}

impl ClassifierPort for ScriptedClassifier {
    fn classify(&mut self, image: &CapturedImage) -> Result<EmotionScores, ClassificationError> {
        self.probe.enter();
        trace!("Scripted classification of {} bytes", image.data.len());

        if let Some(hold) = &self.hold {
            let _ = hold.recv();
        }

        let result = self
            .script
            .pop_front()
            .unwrap_or_else(|| {
                Err(ClassificationError::ModelFault {
                    details: "script exhausted".to_string(),
                })
            });

        self.probe.exit();
        result
    }

    fn close(&mut self) {
        self.probe.close();
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Face presence detector that replays a list of verdicts, then repeats a
/// default verdict
pub struct ScriptedPresence {
    script: VecDeque<Result<bool, PresenceError>>,
    default: bool,
    hold: Option<Receiver<()>>,
    probe: PortProbe,
}

impl ScriptedPresence {
    pub fn new<I>(script: I, default: bool) -> Self
    where
        I: IntoIterator<Item = Result<bool, PresenceError>>,
    {
        Self {
            script: script.into_iter().collect(),
            default,
            hold: None,
            probe: PortProbe::default(),
        }
    }

    /// Always answer `verdict`
    pub fn always(verdict: bool) -> Self {
        Self::new(Vec::new(), verdict)
    }

    /// Same as [`ScriptedClassifier::held`]
    pub fn held(mut self, hold: Receiver<()>) -> Self {
        self.hold = Some(hold);
        self
    }

    pub fn probe(&self) -> PortProbe {
        self.probe.clone()
    }
}

impl FacePresencePort for ScriptedPresence {
    fn has_face(&mut self, frame: &CameraFrame) -> Result<bool, PresenceError> {
        self.probe.enter();
        if let Some(hold) = &self.hold {
            let _ = hold.recv();
        }
        let result = if self.probe.is_closed() {
            Err(PresenceError::Closed)
        } else {
            self.script.pop_front().unwrap_or(Ok(self.default))
        };
        trace!("Scripted presence for frame {}: {:?}", frame.id, result);
        self.probe.exit();
        result
    }

    fn close(&mut self) {
        self.probe.close();
    }
}
