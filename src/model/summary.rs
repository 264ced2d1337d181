use super::emotion::EmotionLabel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Derived statistics for every entry stored under one calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayEmotionSummary {
    pub date: NaiveDate,
    pub dominant_emotion: EmotionLabel,
    pub average_mood: f64,
    pub entry_count: usize,
    /// Fraction of the day's entries per observed dominant emotion
    pub emotion_distribution: BTreeMap<EmotionLabel, f64>,
}

impl DayEmotionSummary {
    /// Fraction for a label, zero when the label was not observed
    pub fn share_of(&self, label: EmotionLabel) -> f64 {
        self.emotion_distribution.get(&label).copied().unwrap_or(0.0)
    }
}
