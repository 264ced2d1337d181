mod engine;
mod recompute;
mod store;


pub use engine::{AggregationEngine, EntryMap, SummaryMap};
pub use recompute::recompute;
