mod emotion;
mod entry;
mod summary;

pub use emotion::{EmotionLabel, EmotionScores};
pub use entry::{EmotionEntry, EmotionEntryBuilder};
pub use summary::DayEmotionSummary;
