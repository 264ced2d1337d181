mod detection;
mod lifecycle;
mod state;
mod stats;

#[cfg(test)]
mod tests;

pub use detection::{DetectionPipeline, DetectionPipelineBuilder, InFlight, RequestOutcome};
pub use lifecycle::ResourceLifecycle;
pub use state::{ClassificationResult, PipelineState};
pub use stats::{PipelineStats, PipelineStatsSnapshot};
