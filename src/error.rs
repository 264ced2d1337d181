use thiserror::Error;

#[derive(Error, Debug)]
pub enum MoodlensError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl MoodlensError {
    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures reported by a classifier port
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("Malformed input image: {details}")]
    MalformedInput { details: String },

    #[error("Model fault: {details}")]
    ModelFault { details: String },

    #[error("Unknown emotion label '{label}'")]
    UnknownLabel { label: String },

    #[error("Invalid score {score} for label '{label}'")]
    InvalidScore { label: String, score: f32 },

    #[error("Classifier returned no scores")]
    EmptyScores,

    #[error("Model could not be loaded: {details}")]
    ModelUnavailable { details: String },
}

/// Failures reported by a face presence port
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PresenceError {
    #[error("Face presence check failed: {details}")]
    CheckFailed { details: String },

    #[error("Face presence detector is closed")]
    Closed,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Classifier resource unavailable: {details}")]
    ResourceUnavailable { details: String },

    #[error("Classification failed: {0}")]
    ClassificationFailed(#[from] ClassificationError),

    #[error("Model resources have been released")]
    ResourceReleased,

    #[error("Operation '{operation}' is not valid in state {state}")]
    InvalidState { operation: String, state: String },

    #[error("Saving entry failed: {details}")]
    SaveFailed { details: String },

    #[error("Face presence check failed: {0}")]
    PresenceCheckFailed(#[from] PresenceError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    #[error("Entry {id} already exists in the journal")]
    DuplicateEntry { id: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, MoodlensError>;
