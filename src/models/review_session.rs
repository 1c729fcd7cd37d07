//! Review session controller: validates one review action, reschedules the
//! card and records the review in the ledger.
//!
//! The card update is committed first. A failed ledger append does not undo it;
//! it is logged and handed back as `ReviewOutcome::ledger_warning`.

use super::review_action::{ReviewAction, ReviewRequest, ReviewResponse};
use super::{Flashcard, ReviewRecord, sm2};
use crate::database::store::{CardStore, ReviewLedger};
use crate::error::{FlashcardError, Result};
use chrono::{DateTime, Utc};

#[derive(Debug)]
pub struct ReviewOutcome {
    pub response: ReviewResponse,
    pub record: ReviewRecord,
    /// Set when the scheduling change was committed but the ledger append failed.
    pub ledger_warning: Option<FlashcardError>,
}

pub struct ReviewSession<'a, S, L> {
    store: &'a S,
    ledger: &'a L,
}

impl<'a, S: CardStore, L: ReviewLedger> ReviewSession<'a, S, L> {
    pub fn new(store: &'a S, ledger: &'a L) -> Self {
        Self { store, ledger }
    }

    /// Handles a raw request. Checks run in order: card id parses, card exists,
    /// action is known, snooze days are positive.
    pub fn submit(&self, request: &ReviewRequest, now: DateTime<Utc>) -> Result<ReviewOutcome> {
        let card_id = request.card_id()?;
        let (action, record, next_review) = self.store.update_card(card_id, |card| {
            let action = request.parse_action()?;
            let (record, next_review) = apply_action(card, action, now)?;
            Ok((action, record, next_review))
        })?;
        Ok(self.finish(action, record, next_review))
    }

    pub fn review(
        &self,
        card_id: i64,
        action: ReviewAction,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let (record, next_review) = self
            .store
            .update_card(card_id, |card| apply_action(card, action, now))?;
        Ok(self.finish(action, record, next_review))
    }

    fn finish(
        &self,
        action: ReviewAction,
        record: ReviewRecord,
        next_review: Option<DateTime<Utc>>,
    ) -> ReviewOutcome {
        log::info!(
            "card {} reviewed: {} (reps {} -> {}, interval {} -> {})",
            record.card_id,
            action.name(),
            record.prior.reps,
            record.new.reps,
            record.prior.interval,
            record.new.interval
        );

        let ledger_warning = match self.ledger.append(&record) {
            Ok(()) => None,
            Err(e) => {
                log::warn!(
                    "review of card {} committed but not recorded: {}",
                    record.card_id,
                    e
                );
                Some(FlashcardError::LedgerWrite(e.to_string()))
            }
        };

        let new_meta = action.quality().map(|_| record.new);
        ReviewOutcome {
            response: ReviewResponse::ok(action, record.card_id, next_review, new_meta),
            record,
            ledger_warning,
        }
    }
}

fn apply_action(
    card: &mut Flashcard,
    action: ReviewAction,
    now: DateTime<Utc>,
) -> Result<(ReviewRecord, Option<DateTime<Utc>>)> {
    let graded = |card: &mut Flashcard, quality: sm2::Quality| {
        sm2::update(card, quality, now).map(|(prior, new)| (quality, prior, new))
    };

    let (quality, prior, new) = match action {
        ReviewAction::Snooze(days) => {
            let snapshot = card.snapshot();
            let until = sm2::add_days(now, days).ok_or_else(|| {
                FlashcardError::InvalidParameter(format!(
                    "snooze_days of {} is too far in the future",
                    days
                ))
            })?;
            card.next_review = Some(until);
            (sm2::Quality::BLACKOUT, snapshot, snapshot)
        }
        ReviewAction::Known => graded(card, sm2::Quality::PERFECT)?,
        ReviewAction::Unknown => graded(card, sm2::Quality::FAILED)?,
    };

    let record = ReviewRecord {
        card_id: card.id,
        reviewed_at: now,
        quality: quality.value(),
        prior,
        new,
    };
    Ok((record, card.next_review))
}
