//! Narrow storage interfaces consumed by the scheduling core.

use crate::error::Result;
use crate::models::{DueQuery, Flashcard, ReviewRecord};
use std::collections::BTreeSet;

pub trait CardStore {
    fn get(&self, id: i64) -> Result<Option<Flashcard>>;

    /// Upserts the scheduling fields of `card`.
    fn save(&self, card: &Flashcard) -> Result<()>;

    /// Loads, mutates and writes back one card as a single atomic step.
    ///
    /// Fails with `NotFound` if the card does not exist. If `f` or the write
    /// fails, nothing is persisted. At most one update runs per store at a time.
    fn update_card<T, F>(&self, id: i64, f: F) -> Result<T>
    where
        F: FnOnce(&mut Flashcard) -> Result<T>;

    /// Cards admitted by `query`, in due order, truncated to the query's limit.
    fn query(&self, query: &DueQuery) -> Result<Vec<Flashcard>>;

    fn distinct_subjects(&self) -> Result<BTreeSet<String>>;

    fn all_tag_tokens(&self) -> Result<BTreeSet<String>>;
}

/// Append-only review history.
pub trait ReviewLedger {
    fn append(&self, record: &ReviewRecord) -> Result<()>;

    /// Records for one card, newest first; equal times newest insertion first.
    fn list_for(&self, card_id: i64) -> Result<Vec<ReviewRecord>>;
}
