use super::emotion::{EmotionLabel, EmotionScores};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One accepted classification, as saved to the journal.
///
/// Entries are immutable once built; consumers only ever receive clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionEntry {
    id: String,
    date: NaiveDate,
    time: NaiveTime,
    dominant_emotion: EmotionLabel,
    emotion_scores: EmotionScores,
    context_tags: BTreeSet<String>,
    mood_note: String,
    captured_image_path: Option<String>,
    user_id: String,
}

impl EmotionEntry {
    pub fn builder(id: impl Into<String>, date: NaiveDate, time: NaiveTime) -> EmotionEntryBuilder {
        EmotionEntryBuilder {
            id: id.into(),
            date,
            time,
            dominant_emotion: EmotionLabel::Neutral,
            emotion_scores: EmotionScores::new(),
            context_tags: BTreeSet::new(),
            mood_note: String::new(),
            captured_image_path: None,
            user_id: String::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn dominant_emotion(&self) -> EmotionLabel {
        self.dominant_emotion
    }

    pub fn emotion_scores(&self) -> &EmotionScores {
        &self.emotion_scores
    }

    pub fn context_tags(&self) -> &BTreeSet<String> {
        &self.context_tags
    }

    pub fn mood_note(&self) -> &str {
        &self.mood_note
    }

    pub fn captured_image_path(&self) -> Option<&str> {
        self.captured_image_path.as_deref()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Builder for [`EmotionEntry`]
#[derive(Debug, Clone)]
pub struct EmotionEntryBuilder {
    id: String,
    date: NaiveDate,
    time: NaiveTime,
    dominant_emotion: EmotionLabel,
    emotion_scores: EmotionScores,
    context_tags: BTreeSet<String>,
    mood_note: String,
    captured_image_path: Option<String>,
    user_id: String,
}

impl EmotionEntryBuilder {
    pub fn dominant_emotion(mut self, label: EmotionLabel) -> Self {
        self.dominant_emotion = label;
        self
    }

    pub fn emotion_scores(mut self, scores: EmotionScores) -> Self {
        self.emotion_scores = scores;
        self
    }

    pub fn context_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn mood_note(mut self, note: impl Into<String>) -> Self {
        self.mood_note = note.into();
        self
    }

    pub fn captured_image_path(mut self, path: Option<String>) -> Self {
        self.captured_image_path = path;
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn build(self) -> EmotionEntry {
        EmotionEntry {
            id: self.id,
            date: self.date,
            time: self.time,
            dominant_emotion: self.dominant_emotion,
            emotion_scores: self.emotion_scores,
            context_tags: self.context_tags,
            mood_note: self.mood_note,
            captured_image_path: self.captured_image_path,
            user_id: self.user_id,
        }
    }
}
