use crate::error::ClassificationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Fixed emotion vocabulary understood by the journal
///
/// Declaration order doubles as the tie-break priority when two labels carry
/// the same classifier score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmotionLabel {
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Disgust,
    Neutral,
}

impl EmotionLabel {
    /// Every label in priority order
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Joy,
        EmotionLabel::Sadness,
        EmotionLabel::Anger,
        EmotionLabel::Fear,
        EmotionLabel::Surprise,
        EmotionLabel::Disgust,
        EmotionLabel::Neutral,
    ];

    /// Mood contribution of an entry with this dominant emotion
    pub fn mood_score(&self) -> f64 {
        match self {
            EmotionLabel::Joy => 1.0,
            EmotionLabel::Neutral => 0.5,
            _ => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Joy => "JOY",
            EmotionLabel::Sadness => "SADNESS",
            EmotionLabel::Anger => "ANGER",
            EmotionLabel::Fear => "FEAR",
            EmotionLabel::Surprise => "SURPRISE",
            EmotionLabel::Disgust => "DISGUST",
            EmotionLabel::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = ClassificationError;

    /// Parse a classifier label, accepting the common model-output spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JOY" | "HAPPY" | "HAPPINESS" => Ok(EmotionLabel::Joy),
            "SADNESS" | "SAD" => Ok(EmotionLabel::Sadness),
            "ANGER" | "ANGRY" => Ok(EmotionLabel::Anger),
            "FEAR" | "FEARFUL" => Ok(EmotionLabel::Fear),
            "SURPRISE" | "SURPRISED" => Ok(EmotionLabel::Surprise),
            "DISGUST" | "DISGUSTED" => Ok(EmotionLabel::Disgust),
            "NEUTRAL" => Ok(EmotionLabel::Neutral),
            _ => Err(ClassificationError::UnknownLabel {
                label: s.to_string(),
            }),
        }
    }
}

/// Validated classifier confidences keyed by label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmotionScores(BTreeMap<EmotionLabel, f32>);

impl EmotionScores {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Validate string-keyed classifier output into the closed vocabulary.
    ///
    /// Unknown labels, negative scores and non-finite scores are rejected
    /// here so nothing downstream ever sees them.
    pub fn from_raw<I, S>(raw: I) -> Result<Self, ClassificationError>
    where
        I: IntoIterator<Item = (S, f32)>,
        S: AsRef<str>,
    {
        let mut scores = BTreeMap::new();
        for (label, score) in raw {
            let label_str = label.as_ref();
            let parsed = label_str.parse::<EmotionLabel>()?;
            if !score.is_finite() || score < 0.0 {
                return Err(ClassificationError::InvalidScore {
                    label: label_str.to_string(),
                    score,
                });
            }
            scores.insert(parsed, score);
        }
        Ok(Self(scores))
    }

    /// Check every score is finite and non-negative
    pub fn validate(&self) -> Result<(), ClassificationError> {
        match self.iter().find(|(_, score)| !score.is_finite() || *score < 0.0) {
            Some((label, score)) => Err(ClassificationError::InvalidScore {
                label: label.as_str().to_string(),
                score,
            }),
            None => Ok(()),
        }
    }

    /// Insert a score, replacing any previous value for the label.
    /// Not validated; see [`validate`](Self::validate).
    pub fn with(mut self, label: EmotionLabel, score: f32) -> Self {
        self.0.insert(label, score);
        self
    }

    pub fn get(&self, label: EmotionLabel) -> Option<f32> {
        self.0.get(&label).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionLabel, f32)> + '_ {
        self.0.iter().map(|(label, score)| (*label, *score))
    }

    /// Label with the highest score; equal scores resolve to the label that
    /// comes first in [`EmotionLabel::ALL`]. Non-finite scores never win.
    pub fn dominant(&self) -> Option<EmotionLabel> {
        let mut best: Option<(EmotionLabel, f32)> = None;
        for (label, score) in self.iter().filter(|(_, score)| score.is_finite()) {
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((label, score)),
            }
        }
        best.map(|(label, _)| label)
    }
}

impl FromIterator<(EmotionLabel, f32)> for EmotionScores {
    fn from_iter<T: IntoIterator<Item = (EmotionLabel, f32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_dominant_by_score() {
        let scores = EmotionScores::new()
            .with(EmotionLabel::Joy, 0.9)
            .with(EmotionLabel::Neutral, 0.1);
        assert_eq!(scores.dominant(), Some(EmotionLabel::Joy));
    }

    #[test]
    fn test_dominant_tie_uses_label_priority() {
        let scores = EmotionScores::new()
            .with(EmotionLabel::Neutral, 0.4)
            .with(EmotionLabel::Anger, 0.4)
            .with(EmotionLabel::Sadness, 0.2);
        assert_eq!(scores.dominant(), Some(EmotionLabel::Anger));
    }

    #[test]
    fn test_dominant_skips_non_finite_scores() {
        let scores = EmotionScores::new()
            .with(EmotionLabel::Sadness, 0.9)
            .with(EmotionLabel::Neutral, f32::NAN)
            .with(EmotionLabel::Joy, f32::INFINITY);
        assert_eq!(scores.dominant(), Some(EmotionLabel::Sadness));

        let all_nan = EmotionScores::new().with(EmotionLabel::Fear, f32::NAN);
        assert_eq!(all_nan.dominant(), None);
    }

    #[test]
    fn test_validate_rejects_negative_and_nan() {
        assert!(EmotionScores::new()
            .with(EmotionLabel::Joy, 0.0)
            .validate()
            .is_ok());

        let negative = EmotionScores::new().with(EmotionLabel::Anger, -5.0);
        assert!(matches!(
            negative.validate(),
            Err(ClassificationError::InvalidScore { ref label, .. }) if label == "ANGER"
        ));

        let nan = EmotionScores::new()
            .with(EmotionLabel::Sadness, 0.9)
            .with(EmotionLabel::Neutral, f32::NAN);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_dominant_of_empty_scores() {
        assert_eq!(EmotionScores::new().dominant(), None);
    }

    #[test]
    fn test_from_raw_accepts_aliases() {
        let mut raw = HashMap::new();
        raw.insert("happy".to_string(), 0.7f32);
        raw.insert("Sad".to_string(), 0.3f32);

        let scores = EmotionScores::from_raw(raw).unwrap();
        assert_eq!(scores.get(EmotionLabel::Joy), Some(0.7));
        assert_eq!(scores.get(EmotionLabel::Sadness), Some(0.3));
    }

    #[test]
    fn test_from_raw_rejects_unknown_label() {
        let result = EmotionScores::from_raw(vec![("contempt", 0.5f32)]);
        assert_eq!(
            result,
            Err(ClassificationError::UnknownLabel {
                label: "contempt".to_string()
            })
        );
    }

    #[test]
    fn test_from_raw_rejects_bad_scores() {
        assert!(EmotionScores::from_raw(vec![("JOY", -0.1f32)]).is_err());
        assert!(EmotionScores::from_raw(vec![("JOY", f32::NAN)]).is_err());
    }

    #[test]
    fn test_mood_scores() {
        assert_eq!(EmotionLabel::Joy.mood_score(), 1.0);
        assert_eq!(EmotionLabel::Neutral.mood_score(), 0.5);
        assert_eq!(EmotionLabel::Anger.mood_score(), 0.0);
        assert_eq!(EmotionLabel::Sadness.mood_score(), 0.0);
    }

    #[test]
    fn test_label_serializes_screaming_case() {
        let json = serde_json::to_string(&EmotionLabel::Surprise).unwrap();
        assert_eq!(json, "\"SURPRISE\"");
    }
}
