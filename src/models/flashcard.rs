//! Flashcard is a question/answer pair plus its spaced repetition state.
use super::SchedulingSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EASINESS: f64 = 2.5;
pub const MIN_EASINESS: f64 = 1.3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub subject: Option<String>,
    /// Raw comma-delimited tag list, stored exactly as entered.
    pub tags: Option<String>,
    pub difficulty: Option<String>,
    pub created_at: DateTime<Utc>,

    pub reps: u32,
    pub easiness: f64,
    pub interval: u32,
    /// `None` means never scheduled, which counts as due immediately.
    pub next_review: Option<DateTime<Utc>>,
}

/// Content of a card that has not been stored yet.
#[derive(Clone, Debug, Default)]
pub struct NewFlashcard {
    pub question: String,
    pub answer: String,
    pub subject: Option<String>,
    pub tags: Option<String>,
    pub difficulty: Option<String>,
}

impl NewFlashcard {
    pub fn new(question: &str, answer: &str) -> Self {
        Self {
            question: question.to_string(),
            answer: answer.to_string(),
            ..Default::default()
        }
    }

    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &str) -> Self {
        self.tags = Some(tags.to_string());
        self
    }

    pub fn with_difficulty(mut self, difficulty: &str) -> Self {
        self.difficulty = Some(difficulty.to_string());
        self
    }
}

impl Flashcard {
    pub fn snapshot(&self) -> SchedulingSnapshot {
        SchedulingSnapshot {
            reps: self.reps,
            interval: self.interval,
            easiness: self.easiness,
        }
    }

    /// Due means never scheduled or scheduled no later than `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review.is_none_or(|next| next <= now)
    }
}

/// Individual tags, split on commas and trimmed; empty pieces are dropped.
pub fn split_tags(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Trims optional text input, mapping blank values to `None`.
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn sample_card(id: i64) -> Flashcard {
        Flashcard {
            id,
            question: "2 + 2".to_string(),
            answer: "4".to_string(),
            subject: Some("math".to_string()),
            tags: Some("arithmetic, basics".to_string()),
            difficulty: None,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
            reps: 0,
            easiness: DEFAULT_EASINESS,
            interval: 0,
            next_review: None,
        }
    }

    #[test]
    fn test_unscheduled_card_is_due() {
        let card = sample_card(1);
        assert!(card.is_due(Utc::now()));
    }

    #[test]
    fn test_due_boundary_is_inclusive() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let mut card = sample_card(1);
        card.next_review = Some(now);
        assert!(card.is_due(now));
        card.next_review = Some(now + chrono::Duration::seconds(1));
        assert!(!card.is_due(now));
    }

    #[test]
    fn test_split_tags_trim_and_skip_empty() {
        let tokens: Vec<&str> = split_tags(" algebra ,, geometry,").collect();
        assert_eq!(tokens, vec!["algebra", "geometry"]);
    }

    #[test]
    fn test_split_tags_keeps_inner_spaces() {
        let tokens: Vec<&str> = split_tags("world war ii , history").collect();
        assert_eq!(tokens, vec!["world war ii", "history"]);
    }

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional(Some("  bio ")), Some("bio".to_string()));
        assert_eq!(normalize_optional(Some("   ")), None);
        assert_eq!(normalize_optional(None), None);
    }
}
