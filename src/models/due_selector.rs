//! Due card selection: which cards to study now, in which order.
//!
//! Never-scheduled cards come first, then ascending `next_review`, then
//! ascending creation time, with the card id as the final tie-break so the
//! order is total.

use super::Flashcard;
use crate::database::store::CardStore;
use crate::error::{FlashcardError, Result};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeSet;

pub const DEFAULT_STUDY_LIMIT: usize = 200;

/// Optional study filters, combined with logical AND.
#[derive(Clone, Debug, Default)]
pub struct DueFilter {
    /// Also return cards whose `next_review` lies in the future.
    pub include_snoozed: bool,
    /// Case-insensitive substring of the card's subject.
    pub subject: Option<String>,
    /// Case-insensitive substring of the raw comma-joined tag field.
    /// "art" matches "smart,history" as well as "art".
    pub tag: Option<String>,
    pub limit: Option<usize>,
}

/// A validated filter bound to a point in time.
#[derive(Clone, Debug)]
pub struct DueQuery {
    now: DateTime<Utc>,
    include_snoozed: bool,
    subject: Option<String>,
    tag: Option<String>,
    limit: usize,
}

impl DueQuery {
    pub fn new(now: DateTime<Utc>, filter: &DueFilter) -> Result<Self> {
        let limit = filter.limit.unwrap_or(DEFAULT_STUDY_LIMIT);
        if limit == 0 {
            return Err(FlashcardError::InvalidParameter(
                "limit must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            now,
            include_snoozed: filter.include_snoozed,
            subject: needle(filter.subject.as_deref()),
            tag: needle(filter.tag.as_deref()),
            limit,
        })
    }

    /// Latest `next_review` a returned card may have, if any bound applies.
    pub fn due_cutoff(&self) -> Option<DateTime<Utc>> {
        (!self.include_snoozed).then_some(self.now)
    }

    pub fn admits(&self, card: &Flashcard) -> bool {
        if !self.include_snoozed && !card.is_due(self.now) {
            return false;
        }
        contains_ci(card.subject.as_deref(), self.subject.as_deref())
            && contains_ci(card.tags.as_deref(), self.tag.as_deref())
    }

    /// Filters, orders and truncates a candidate set.
    pub fn apply(&self, cards: impl IntoIterator<Item = Flashcard>) -> Vec<Flashcard> {
        let mut selected: Vec<Flashcard> = cards.into_iter().filter(|c| self.admits(c)).collect();
        selected.sort_by(cmp_due);
        selected.truncate(self.limit);
        selected
    }
}

/// Total due order: unscheduled first, then `next_review`, `created_at`, `id`.
pub fn cmp_due(a: &Flashcard, b: &Flashcard) -> Ordering {
    // Option orders None before Some.
    a.next_review
        .cmp(&b.next_review)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Returns the cards eligible for review at `now`.
pub fn select<S: CardStore>(store: &S, now: DateTime<Utc>, filter: &DueFilter) -> Result<Vec<Flashcard>> {
    let query = DueQuery::new(now, filter)?;
    let cards = store.query(&query)?;
    log::debug!(
        "selected {} due cards (subject={:?}, tag={:?}, include_snoozed={})",
        cards.len(),
        filter.subject,
        filter.tag,
        filter.include_snoozed
    );
    Ok(cards)
}

/// Values offered to the user for the subject and tag filters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudyChoices {
    pub subjects: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

pub fn filter_choices<S: CardStore>(store: &S) -> Result<StudyChoices> {
    Ok(StudyChoices {
        subjects: store.distinct_subjects()?,
        tags: store.all_tag_tokens()?,
    })
}

fn needle(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn contains_ci(haystack: Option<&str>, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(needle) => haystack.is_some_and(|h| h.to_lowercase().contains(needle)),
    }
}
