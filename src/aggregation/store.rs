use crate::model::EmotionEntry;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

/// Date-indexed entry lists, insertion order preserved per date
#[derive(Debug, Default, Clone)]
pub(crate) struct EntryStore {
    by_date: BTreeMap<NaiveDate, Vec<EmotionEntry>>,
    ids: HashSet<String>,
}

impl EntryStore {
    pub(crate) fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Append to the end of the entry's date
    pub(crate) fn append(&mut self, entry: EmotionEntry) {
        self.ids.insert(entry.id().to_string());
        self.by_date.entry(entry.date()).or_default().push(entry);
    }

    pub(crate) fn entries_for(&self, date: NaiveDate) -> &[EmotionEntry] {
        self.by_date.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn snapshot(&self) -> BTreeMap<NaiveDate, Vec<EmotionEntry>> {
        self.by_date.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    pub(crate) fn clear(&mut self) {
        self.by_date.clear();
        self.ids.clear();
    }
}
