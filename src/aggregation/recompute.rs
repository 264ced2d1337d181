use crate::model::{DayEmotionSummary, EmotionEntry, EmotionLabel};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Derive the summary for one date from its full, ordered entry list.
///
/// Pure function of `entries`: the same list always yields an identical
/// summary. Returns `None` for an empty list.
pub fn recompute(date: NaiveDate, entries: &[EmotionEntry]) -> Option<DayEmotionSummary> {
    let (latest, earlier) = entries.split_last()?;
    Some(summarize(date, earlier, latest))
}

/// Summary of a date whose entries are `earlier` followed by `latest`
pub(crate) fn summarize(
    date: NaiveDate,
    earlier: &[EmotionEntry],
    latest: &EmotionEntry,
) -> DayEmotionSummary {
    // Counts kept in first-occurrence order for the dominant tie-break
    let mut counts: Vec<(EmotionLabel, usize)> = Vec::new();
    let mut mood_total = 0.0f64;

    for entry in earlier.iter().chain(std::iter::once(latest)) {
        let label = entry.dominant_emotion();
        mood_total += label.mood_score();
        match counts.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }

    // Strictly greater keeps the earliest label on ties
    let mut dominant = (latest.dominant_emotion(), 0);
    for candidate in &counts {
        if candidate.1 > dominant.1 {
            dominant = *candidate;
        }
    }

    let entry_count = earlier.len() + 1;
    let emotion_distribution: BTreeMap<EmotionLabel, f64> = counts
        .iter()
        .map(|(label, count)| (*label, *count as f64 / entry_count as f64))
        .collect();

    DayEmotionSummary {
        date,
        dominant_emotion: dominant.0,
        average_mood: mood_total / entry_count as f64,
        entry_count,
        emotion_distribution,
    }
}
