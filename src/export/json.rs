//! JSON import/export of the whole collection.
//! Cards carry their full scheduling state and reviews their before/after
//! snapshots, so a round trip through an empty store reproduces the schedule.
//! Card ids are remapped on import.

use crate::database::SqliteStore;
use crate::database::db::ImportSummary;
use crate::error::Result;
use crate::models::flashcard::normalize_optional;
use crate::models::review_action::{format_timestamp, integer_like};
use crate::models::{
    DEFAULT_EASINESS, Flashcard, MIN_EASINESS, Quality, ReviewRecord, SchedulingSnapshot,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExportPayload {
    #[serde(default)]
    pub cards: Vec<CardExport>,
    #[serde(default)]
    pub reviews: Vec<ReviewExport>,
    #[serde(default)]
    pub exported_at: Option<String>,
}

/// Card as written to and read from an export. Every field is optional on
/// import; missing values fall back to new-card defaults.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CardExport {
    pub id: Option<i64>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub subject: Option<String>,
    pub tags: Option<String>,
    pub difficulty: Option<String>,
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub reps: Option<u32>,
    #[serde(deserialize_with = "lenient_f64")]
    pub easiness: Option<f64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub interval: Option<u32>,
    pub next_review: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewExport {
    pub card_id: Option<i64>,
    pub when: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pub quality: Option<i64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub prior_reps: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub prior_interval: Option<u32>,
    #[serde(deserialize_with = "lenient_f64")]
    pub prior_easiness: Option<f64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub new_reps: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub new_interval: Option<u32>,
    #[serde(deserialize_with = "lenient_f64")]
    pub new_easiness: Option<f64>,
}

// Scheduling numbers from older or hand-edited exports: anything of the wrong
// type or out of range reads as missing, so the field takes its default.
fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<i64>, D::Error> {
    Ok(integer_like(&Value::deserialize(d)?))
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u32>, D::Error> {
    Ok(integer_like(&Value::deserialize(d)?).and_then(|n| u32::try_from(n).ok()))
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    let number = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(number.filter(|f: &f64| f.is_finite()))
}

impl From<&Flashcard> for CardExport {
    fn from(card: &Flashcard) -> Self {
        Self {
            id: Some(card.id),
            question: Some(card.question.clone()),
            answer: Some(card.answer.clone()),
            subject: card.subject.clone(),
            tags: card.tags.clone(),
            difficulty: card.difficulty.clone(),
            created_at: Some(format_timestamp(card.created_at)),
            reps: Some(card.reps),
            easiness: Some(card.easiness),
            interval: Some(card.interval),
            next_review: card.next_review.map(format_timestamp),
        }
    }
}

impl From<&ReviewRecord> for ReviewExport {
    fn from(record: &ReviewRecord) -> Self {
        Self {
            card_id: Some(record.card_id),
            when: Some(format_timestamp(record.reviewed_at)),
            quality: Some(record.quality as i64),
            prior_reps: Some(record.prior.reps),
            prior_interval: Some(record.prior.interval),
            prior_easiness: Some(record.prior.easiness),
            new_reps: Some(record.new.reps),
            new_interval: Some(record.new.interval),
            new_easiness: Some(record.new.easiness),
        }
    }
}

/// Collects every card (newest first) and every review (oldest first).
pub fn export_payload(store: &SqliteStore, now: DateTime<Utc>) -> Result<ExportPayload> {
    Ok(ExportPayload {
        cards: store.all_cards()?.iter().map(CardExport::from).collect(),
        reviews: store.all_reviews()?.iter().map(ReviewExport::from).collect(),
        exported_at: Some(format_timestamp(now)),
    })
}

/// Exports the collection to a pretty-printed JSON file at `path`.
pub fn export_json_to_path(store: &SqliteStore, path: &Path, now: DateTime<Utc>) -> Result<()> {
    let payload = export_payload(store, now)?;
    let json_string = serde_json::to_string_pretty(&payload)?;
    fs::write(path, json_string)?;
    log::info!(
        "exported {} cards and {} reviews to {}",
        payload.cards.len(),
        payload.reviews.len(),
        path.display()
    );
    Ok(())
}

/// Reads an export file. Fails if the file is missing or not valid JSON.
pub fn import_json(path: &Path) -> Result<ExportPayload> {
    let contents = fs::read_to_string(path)?;
    let payload: ExportPayload = serde_json::from_str(&contents)?;
    Ok(payload)
}

/// Loads `payload` into `store` in one transaction.
pub fn import_payload(
    store: &SqliteStore,
    payload: &ExportPayload,
    now: DateTime<Utc>,
) -> Result<ImportSummary> {
    let mut placeholder_id = payload.cards.iter().filter_map(|c| c.id).max().unwrap_or(0);
    let cards: Vec<Flashcard> = payload
        .cards
        .iter()
        .filter_map(|c| {
            let id = c.id.unwrap_or_else(|| {
                placeholder_id += 1;
                placeholder_id
            });
            card_from_export(id, c, now)
        })
        .collect();

    let reviews: Vec<ReviewRecord> = payload
        .reviews
        .iter()
        .filter_map(|r| review_from_export(r, now))
        .collect();

    store.import_batch(&cards, &reviews)
}

fn card_from_export(id: i64, card: &CardExport, now: DateTime<Utc>) -> Option<Flashcard> {
    let question = normalize_optional(card.question.as_deref())?;
    let answer = normalize_optional(card.answer.as_deref())?;
    Some(Flashcard {
        id,
        question,
        answer,
        subject: normalize_optional(card.subject.as_deref()),
        tags: normalize_optional(card.tags.as_deref()),
        difficulty: normalize_optional(card.difficulty.as_deref()),
        created_at: card
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(now),
        reps: card.reps.unwrap_or(0),
        easiness: card.easiness.unwrap_or(DEFAULT_EASINESS).max(MIN_EASINESS),
        interval: card.interval.unwrap_or(0),
        next_review: card.next_review.as_deref().and_then(parse_timestamp),
    })
}

fn review_from_export(review: &ReviewExport, now: DateTime<Utc>) -> Option<ReviewRecord> {
    let card_id = review.card_id?;
    let quality = match Quality::try_from(review.quality.unwrap_or(0)) {
        Ok(quality) => quality,
        Err(e) => {
            log::warn!("skipping review of card {}: {}", card_id, e);
            return None;
        }
    };
    Some(ReviewRecord {
        card_id,
        reviewed_at: review
            .when
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(now),
        quality: quality.value(),
        prior: SchedulingSnapshot {
            reps: review.prior_reps.unwrap_or(0),
            interval: review.prior_interval.unwrap_or(0),
            easiness: review.prior_easiness.unwrap_or(DEFAULT_EASINESS),
        },
        new: SchedulingSnapshot {
            reps: review.new_reps.unwrap_or(0),
            interval: review.new_interval.unwrap_or(0),
            easiness: review.new_easiness.unwrap_or(DEFAULT_EASINESS),
        },
    })
}

/// Parses RFC 3339, or a naive ISO-8601 date-time taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{CardStore, ReviewLedger};
    use crate::models::{NewFlashcard, ReviewAction, ReviewSession};
    use chrono::{Duration, TimeZone};
    use std::fs;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 7, 15, 0).unwrap()
    }

    fn populated_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let hello = store
            .add_card(
                &NewFlashcard::new("cześć", "hello").with_tags("polish, greetings"),
                now() - Duration::days(10),
            )
            .unwrap();
        let thanks = store
            .add_card(
                &NewFlashcard::new("dziękuję", "thank you").with_subject("polish"),
                now() - Duration::days(9),
            )
            .unwrap();
        store
            .add_card(&NewFlashcard::new("proszę", "please"), now() - Duration::days(8))
            .unwrap();

        let session = ReviewSession::new(&store, &store);
        session
            .review(hello.id, ReviewAction::Known, now() - Duration::days(7))
            .unwrap();
        session
            .review(hello.id, ReviewAction::Known, now() - Duration::days(6))
            .unwrap();
        session
            .review(thanks.id, ReviewAction::Unknown, now() - Duration::days(5))
            .unwrap();
        session
            .review(thanks.id, ReviewAction::Snooze(4), now() - Duration::days(5))
            .unwrap();
        store
    }

    fn by_question(store: &SqliteStore, question: &str) -> Flashcard {
        store
            .all_cards()
            .unwrap()
            .into_iter()
            .find(|c| c.question == question)
            .unwrap()
    }

    #[test]
    fn test_export_json_to_path() {
        let store = populated_store();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flashcards_export_full.json");

        export_json_to_path(&store, &path, now()).unwrap();

        assert!(fs::metadata(&path).is_ok(), "File should exist");
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["cards"].as_array().unwrap().len(), 3);
        assert_eq!(value["reviews"].as_array().unwrap().len(), 4);
        assert_eq!(value["cards"][0]["question"], "proszę");
        assert_eq!(value["cards"][0]["next_review"], serde_json::Value::Null);
    }

    #[test]
    fn test_export_and_import_roundtrip() {
        let original = populated_store();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.json");
        export_json_to_path(&original, &path, now()).unwrap();

        let restored = SqliteStore::open_in_memory().unwrap();
        let payload = import_json(&path).unwrap();
        let summary = import_payload(&restored, &payload, now()).unwrap();
        assert_eq!(summary.cards, 3);
        assert_eq!(summary.reviews, 4);

        for question in ["cześć", "dziękuję", "proszę"] {
            let before = by_question(&original, question);
            let after = by_question(&restored, question);
            assert_eq!(after.snapshot(), before.snapshot(), "{}", question);
            assert_eq!(after.next_review, before.next_review, "{}", question);
            assert_eq!(after.created_at, before.created_at);
            assert_eq!(after.tags, before.tags);

            let before_history: Vec<ReviewRecord> = original
                .list_for(before.id)
                .unwrap()
                .into_iter()
                .map(|r| ReviewRecord { card_id: 0, ..r })
                .collect();
            let after_history: Vec<ReviewRecord> = restored
                .list_for(after.id)
                .unwrap()
                .into_iter()
                .map(|r| ReviewRecord { card_id: 0, ..r })
                .collect();
            assert_eq!(after_history, before_history, "{}", question);
        }
    }

    #[test]
    fn test_import_legacy_payload() {
        let json_content = r#"{
  "cards": [
    {"id": 7, "question": "H2O", "answer": "water", "reps": 2, "easiness": 2.7,
     "interval": 6, "next_review": "2025-09-03T10:00:00.123456"},
    {"id": 8, "question": "", "answer": "dropped"},
    {"id": 9, "question": "NaCl", "answer": "salt", "easiness": 0.9,
     "next_review": "someday"}
  ],
  "reviews": [
    {"card_id": 7, "when": "2025-08-28T10:00:00", "quality": 5,
     "prior_reps": 1, "prior_interval": 1, "prior_easiness": 2.6,
     "new_reps": 2, "new_interval": 6, "new_easiness": 2.7},
    {"card_id": 8, "when": "2025-08-28T10:00:00", "quality": 2},
    {"card_id": 9, "when": "not a date"}
  ]
}"#;
        let payload: ExportPayload = serde_json::from_str(json_content).unwrap();
        let store = SqliteStore::open_in_memory().unwrap();
        let summary = import_payload(&store, &payload, now()).unwrap();
        assert_eq!(summary.cards, 2);
        assert_eq!(summary.reviews, 2);

        let water = by_question(&store, "H2O");
        assert_eq!((water.reps, water.interval), (2, 6));
        assert_eq!(
            water.next_review,
            Some(Utc.with_ymd_and_hms(2025, 9, 3, 10, 0, 0).unwrap() + Duration::milliseconds(123))
        );
        assert_eq!(water.created_at, now());
        let history = store.list_for(water.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].prior.easiness, 2.6);

        let salt = by_question(&store, "NaCl");
        assert_eq!(salt.easiness, MIN_EASINESS);
        assert_eq!(salt.next_review, None);
        let history = store.list_for(salt.id).unwrap();
        assert_eq!(history[0].reviewed_at, now());
        assert_eq!(history[0].quality, 0);
    }

    #[test]
    fn test_import_bad_scheduling_numbers_take_defaults() {
        let json_content = r#"{
  "cards": [
    {"id": 1, "question": "Fe", "answer": "iron", "reps": -3, "interval": 2.5,
     "easiness": "abc"},
    {"id": 2, "question": "Au", "answer": "gold", "reps": "4", "interval": 12.0,
     "easiness": "2.1"}
  ],
  "reviews": [
    {"card_id": 1, "when": "2025-08-28T10:00:00", "quality": "high",
     "prior_reps": -1, "new_reps": 1.5, "new_easiness": [2.6]}
  ]
}"#;
        let payload: ExportPayload = serde_json::from_str(json_content).unwrap();
        let store = SqliteStore::open_in_memory().unwrap();
        let summary = import_payload(&store, &payload, now()).unwrap();
        assert_eq!(summary.cards, 2);
        assert_eq!(summary.reviews, 1);

        let iron = by_question(&store, "Fe");
        assert_eq!((iron.reps, iron.interval), (0, 0));
        assert_eq!(iron.easiness, DEFAULT_EASINESS);
        let history = store.list_for(iron.id).unwrap();
        assert_eq!(history[0].quality, 0);
        assert_eq!(history[0].prior.reps, 0);
        assert_eq!(history[0].new.reps, 0);
        assert_eq!(history[0].new.easiness, DEFAULT_EASINESS);

        let gold = by_question(&store, "Au");
        assert_eq!((gold.reps, gold.interval), (4, 12));
        assert_eq!(gold.easiness, 2.1);
    }

    #[test]
    fn test_import_nonexistent_file() {
        let result = import_json(Path::new("nonexistent_file_xyz123.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_import_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid.json");
        fs::write(&path, "{ this is not valid json }").unwrap();

        let result = import_json(&path);
        assert!(matches!(result, Err(crate::FlashcardError::Json(_))));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_timestamp("2025-01-02T03:04:05Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-02T04:04:05+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-02T03:04:05"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-02 03:04:05"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_imported_card_schedules_like_original() {
        let original = populated_store();
        let payload = export_payload(&original, now()).unwrap();
        let restored = SqliteStore::open_in_memory().unwrap();
        import_payload(&restored, &payload, now()).unwrap();

        let a = by_question(&original, "cześć");
        let b = by_question(&restored, "cześć");
        let session_a = ReviewSession::new(&original, &original);
        let session_b = ReviewSession::new(&restored, &restored);
        let out_a = session_a.review(a.id, ReviewAction::Known, now()).unwrap();
        let out_b = session_b.review(b.id, ReviewAction::Known, now()).unwrap();
        assert_eq!(out_a.record.new, out_b.record.new);
        assert_eq!(
            original.get(a.id).unwrap().unwrap().next_review,
            restored.get(b.id).unwrap().unwrap().next_review
        );
    }
}
