pub mod aggregation;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod gate;
pub mod model;
pub mod pipeline;
pub mod ports;

pub use aggregation::{recompute, AggregationEngine, EntryMap, SummaryMap};
pub use config::{GateConfig, JournalConfig, MoodlensConfig, PipelineConfig, SystemConfig};
pub use error::{
    AggregationError, ClassificationError, EventBusError, MoodlensError, PipelineError,
    PresenceError, Result,
};
pub use events::{spawn_handler, EventBus, EventFilter, EventHandler, EventReceiver, MoodEvent};
pub use frame::{CameraFrame, CapturedImage, FrameFormat};
pub use gate::{FaceGateState, FrameGate, GateDecision, GateStats, GateStatsSnapshot};
pub use model::{DayEmotionSummary, EmotionEntry, EmotionEntryBuilder, EmotionLabel, EmotionScores};
pub use pipeline::{
    ClassificationResult, DetectionPipeline, DetectionPipelineBuilder, InFlight, PipelineState,
    PipelineStats, PipelineStatsSnapshot, RequestOutcome, ResourceLifecycle,
};
pub use ports::{
    ClassifierFactory, ClassifierPort, ClockPort, FacePresencePort, FallbackClassifier, FixedClock,
    IdPort, PortProbe, ScriptedClassifier, ScriptedPresence, SequentialIds, SystemClock,
    UuidIdGenerator,
};
