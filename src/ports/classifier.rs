use crate::error::ClassificationError;
use crate::frame::CapturedImage;
use crate::model::{EmotionLabel, EmotionScores};
use tracing::debug;

/// Emotion classifier backed by a native model.
///
/// Calls block and must be driven from a worker thread. `close` releases the
/// native resources and may be called more than once.
pub trait ClassifierPort: Send {
    fn classify(&mut self, image: &CapturedImage) -> Result<EmotionScores, ClassificationError>;

    fn close(&mut self);

    /// Short name used in logs
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Deferred classifier construction, so model load failures can be caught
pub type ClassifierFactory =
    Box<dyn FnOnce() -> Result<Box<dyn ClassifierPort>, ClassificationError> + Send>;

/// Deterministic stand-in used when the real model cannot be loaded.
///
/// Scores are derived from a hash of the image bytes, so the same capture
/// always produces the same result.
#[derive(Debug, Default)]
pub struct FallbackClassifier {
    closed: bool,
}

impl FallbackClassifier {
    pub fn new() -> Self {
        Self { closed: false }
    }

    fn fingerprint(data: &[u8]) -> u64 {
        // FNV-1a
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in data {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash
    }
}

impl ClassifierPort for FallbackClassifier {
    fn classify(&mut self, image: &CapturedImage) -> Result<EmotionScores, ClassificationError> {
        if self.closed {
            return Err(ClassificationError::ModelFault {
                details: "fallback classifier is closed".to_string(),
            });
        }
        if !image.validate_size() {
            return Err(ClassificationError::MalformedInput {
                details: format!(
                    "{}x{} {:?} image with {} bytes",
                    image.width,
                    image.height,
                    image.format,
                    image.data.len()
                ),
            });
        }

        let hash = Self::fingerprint(&image.data);
        let labels = EmotionLabel::ALL;
        let primary = labels[(hash % labels.len() as u64) as usize];
        let secondary = labels[((hash >> 16) % labels.len() as u64) as usize];
        let primary_score = 0.55 + ((hash >> 32) % 40) as f32 / 100.0;

        let mut scores = EmotionScores::new().with(primary, primary_score);
        if secondary != primary {
            scores = scores.with(secondary, 1.0 - primary_score);
        }

        debug!(
            "Fallback classifier produced {} with score {:.2}",
            primary, primary_score
        );
        Ok(scores)
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn name(&self) -> &str {
        "fallback"
    }
}
