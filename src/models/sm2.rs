//! SM-2 (SuperMemo 2) spaced repetition algorithm implementation.
//!
//! The SM-2 algorithm calculates review intervals based on recall quality:
//! - Each card has an easiness factor (EF) that adjusts based on performance
//! - Quality grades 0-2: repetitions reset and the card comes back tomorrow
//! - Quality grades 3-5: interval grows progressively (1 day → 6 days → interval × EF)
//! - EF is adjusted after every review and has a minimum value of 1.3
//!
//! Intervals past the second repetition use `f64::round`, which rounds halves
//! away from zero (5.5 → 6).

use super::{Flashcard, MIN_EASINESS, SchedulingSnapshot};
use crate::error::{FlashcardError, Result};
use chrono::{DateTime, TimeDelta, Utc};

/// Recall quality: 0 = complete blackout, 5 = perfect response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub const BLACKOUT: Quality = Quality(0);
    pub const FAILED: Quality = Quality(2);
    pub const PERFECT: Quality = Quality(5);

    /// Lowest grade that counts as a successful recall.
    pub const PASSING: u8 = 3;

    pub fn new(value: u8) -> Result<Self> {
        if value > 5 {
            return Err(FlashcardError::InvalidParameter(format!(
                "quality must be between 0 and 5, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_lapse(self) -> bool {
        self.0 < Self::PASSING
    }
}

impl TryFrom<i64> for Quality {
    type Error = FlashcardError;

    fn try_from(value: i64) -> Result<Self> {
        u8::try_from(value)
            .map_err(|_| {
                FlashcardError::InvalidParameter(format!(
                    "quality must be between 0 and 5, got {}",
                    value
                ))
            })
            .and_then(Quality::new)
    }
}

/// EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02)), floored at 1.3.
pub fn next_easiness(easiness: f64, quality: Quality) -> f64 {
    let miss = 5.0 - quality.value() as f64;
    let updated = easiness + (0.1 - miss * (0.08 + miss * 0.02));
    updated.max(MIN_EASINESS)
}

/// `now + days`, or `None` past the last representable date.
pub fn add_days(now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    TimeDelta::try_days(days as i64).and_then(|delta| now.checked_add_signed(delta))
}

/// Applies one graded review to `card` and returns its (prior, new) snapshots.
///
/// Sets `reps`, `interval`, `easiness` and `next_review = now + interval days`.
/// Fails with `ScheduleOverflow`, leaving `card` untouched, when the new due
/// date cannot be represented. Does no I/O.
pub fn update(
    card: &mut Flashcard,
    quality: Quality,
    now: DateTime<Utc>,
) -> Result<(SchedulingSnapshot, SchedulingSnapshot)> {
    let prior = card.snapshot();

    let (reps, interval) = if quality.is_lapse() {
        (0, 1)
    } else {
        let reps = prior.reps.saturating_add(1);
        let interval = match reps {
            1 => 1,
            2 => 6,
            // Uses the easiness from before this review's adjustment.
            _ => {
                let base = prior.interval.max(1) as f64;
                ((base * prior.easiness).round() as u32).max(1)
            }
        };
        (reps, interval)
    };

    let next_review = add_days(now, interval).ok_or(FlashcardError::ScheduleOverflow {
        card_id: card.id,
        interval,
    })?;

    card.reps = reps;
    card.interval = interval;
    card.easiness = next_easiness(prior.easiness, quality);
    card.next_review = Some(next_review);

    Ok((prior, card.snapshot()))
}
