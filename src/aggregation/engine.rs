use super::recompute::{recompute, summarize};
use super::store::EntryStore;
use crate::error::AggregationError;
use crate::events::{EventBus, MoodEvent};
use crate::model::{DayEmotionSummary, EmotionEntry};
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tokio::sync::watch;
use tracing::{debug, info};

pub type SummaryMap = BTreeMap<NaiveDate, DayEmotionSummary>;
pub type EntryMap = BTreeMap<NaiveDate, Vec<EmotionEntry>>;

struct Journal {
    store: EntryStore,
    summaries: SummaryMap,
}

/// Owner of the entry store and the per-day summaries derived from it.
///
/// Every write recomputes the touched date from its full entry list, so the
/// summaries can never drift from the stored entries. Readers only get
/// snapshots.
pub struct AggregationEngine {
    journal: RwLock<Journal>,
    summaries_tx: watch::Sender<SummaryMap>,
    entries_tx: watch::Sender<EntryMap>,
    event_bus: Option<EventBus>,
}

impl AggregationEngine {
    pub fn new() -> Self {
        let (summaries_tx, _) = watch::channel(SummaryMap::new());
        let (entries_tx, _) = watch::channel(EntryMap::new());
        Self {
            journal: RwLock::new(Journal {
                store: EntryStore::default(),
                summaries: SummaryMap::new(),
            }),
            summaries_tx,
            entries_tx,
            event_bus: None,
        }
    }

    /// Also announce saves and summary updates on the given bus
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Append an entry to its date and recompute that date's summary
    pub fn add_entry(&self, entry: EmotionEntry) -> Result<DayEmotionSummary, AggregationError> {
        let entry_id = entry.id().to_string();
        let date = entry.date();
        let dominant_emotion = entry.dominant_emotion();

        let summary = {
            let mut journal = self.journal.write();
            if journal.store.contains_id(&entry_id) {
                return Err(AggregationError::DuplicateEntry { id: entry_id });
            }

            let summary = summarize(date, journal.store.entries_for(date), &entry);
            journal.store.append(entry);
            journal.summaries.insert(date, summary.clone());

            self.publish_snapshots(&journal);
            summary
        };

        debug!(
            "Entry {} added for {}: {} entries, dominant {}",
            entry_id, date, summary.entry_count, summary.dominant_emotion
        );

        if let Some(bus) = &self.event_bus {
            bus.notify(MoodEvent::EntrySaved {
                entry_id,
                date,
                dominant_emotion,
            });
            bus.notify(MoodEvent::SummaryUpdated {
                date,
                entry_count: summary.entry_count,
            });
        }

        Ok(summary)
    }

    /// Ordered entries for a date; empty if none were saved
    pub fn get_entries_for_date(&self, date: NaiveDate) -> Vec<EmotionEntry> {
        self.journal.read().store.entries_for(date).to_vec()
    }

    pub fn summary_for_date(&self, date: NaiveDate) -> Option<DayEmotionSummary> {
        self.journal.read().summaries.get(&date).cloned()
    }

    pub fn summaries(&self) -> SummaryMap {
        self.journal.read().summaries.clone()
    }

    pub fn entries(&self) -> EntryMap {
        self.journal.read().store.snapshot()
    }

    pub fn entry_count(&self) -> usize {
        self.journal.read().store.len()
    }

    /// Watch the summary map; the current value is available immediately
    pub fn subscribe_summaries(&self) -> watch::Receiver<SummaryMap> {
        self.summaries_tx.subscribe()
    }

    /// Watch the full entry store
    pub fn subscribe_entries(&self) -> watch::Receiver<EntryMap> {
        self.entries_tx.subscribe()
    }

    /// Replace the whole journal with `entries`, added in order.
    ///
    /// The current journal is left untouched if the list contains a
    /// duplicate id.
    pub fn rebuild(&self, entries: Vec<EmotionEntry>) -> Result<(), AggregationError> {
        let mut store = EntryStore::default();
        for entry in entries {
            if store.contains_id(entry.id()) {
                return Err(AggregationError::DuplicateEntry {
                    id: entry.id().to_string(),
                });
            }
            store.append(entry);
        }

        let summaries: SummaryMap = store
            .snapshot()
            .iter()
            .filter_map(|(date, day_entries)| recompute(*date, day_entries).map(|s| (*date, s)))
            .collect();

        let mut journal = self.journal.write();
        journal.store = store;
        journal.summaries = summaries;
        self.publish_snapshots(&journal);

        info!(
            "Journal rebuilt with {} entries across {} days",
            journal.store.len(),
            journal.summaries.len()
        );
        Ok(())
    }

    /// Drop every entry and summary. Test and demo reset only.
    pub fn clear_all(&self) {
        let mut journal = self.journal.write();
        journal.store.clear();
        journal.summaries.clear();
        self.publish_snapshots(&journal);
        info!("Journal cleared");
    }

    fn publish_snapshots(&self, journal: &Journal) {
        self.summaries_tx.send_replace(journal.summaries.clone());
        self.entries_tx.send_replace(journal.store.snapshot());
    }
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new()
    }
}
