use crate::model::{EmotionEntry, EmotionLabel, EmotionScores};
use std::fmt;

/// Outcome of one successful classification
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub dominant_emotion: EmotionLabel,
    pub scores: EmotionScores,
    /// Storage reference of the classified capture, if the host kept one
    pub image_ref: Option<String>,
}

/// Observable state of the detection pipeline
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PipelineState {
    /// Idle, ready for a capture
    #[default]
    Initial,
    /// A classification is outstanding
    Loading { generation: u64 },
    /// Classification finished and awaits the user's confirmation
    Success(ClassificationResult),
    /// The confirmed entry was saved; returns to `Initial` after a delay
    Saved(EmotionEntry),
    /// The last request or save failed. A failed save keeps its result so
    /// it can be retried without a new capture.
    Error {
        message: String,
        retained: Option<ClassificationResult>,
    },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Initial => "Initial",
            PipelineState::Loading { .. } => "Loading",
            PipelineState::Success(_) => "Success",
            PipelineState::Saved(_) => "Saved",
            PipelineState::Error { .. } => "Error",
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, PipelineState::Loading { .. })
    }

    /// Whether a new classification may be requested from this state
    pub fn accepts_request(&self) -> bool {
        matches!(
            self,
            PipelineState::Initial | PipelineState::Success(_) | PipelineState::Error { .. }
        )
    }

    /// Result that a save would use, if any
    pub fn saveable_result(&self) -> Option<&ClassificationResult> {
        match self {
            PipelineState::Success(result) => Some(result),
            PipelineState::Error {
                retained: Some(result),
                ..
            } => Some(result),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Loading { generation } => write!(f, "Loading(#{})", generation),
            PipelineState::Success(result) => write!(f, "Success({})", result.dominant_emotion),
            PipelineState::Error { message, .. } => write!(f, "Error({})", message),
            other => f.write_str(other.name()),
        }
    }
}
