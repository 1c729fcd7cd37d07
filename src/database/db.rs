//! SQLite card store and review ledger
//!
//! Handles database initialization and migration, card CRUD, the due-card
//! candidate query and the append-only review history. Timestamps are stored
//! as INTEGER unix milliseconds.

use super::store::{CardStore, ReviewLedger};
use crate::error::{FlashcardError, Result};
use crate::models::flashcard::{normalize_optional, split_tags};
use crate::models::{
    DEFAULT_EASINESS, DueQuery, Flashcard, MIN_EASINESS, NewFlashcard, ReviewRecord,
    SchedulingSnapshot,
};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSqlError, Type};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const CARD_COLUMNS: &str = "id, question, answer, subject, tags, difficulty, created_at,
     repetitions, easiness_factor, interval_days, next_review_date";

const REVIEW_COLUMNS: &str = "card_id, reviewed_at, quality,
     prior_repetitions, prior_interval_days, prior_easiness_factor,
     new_repetitions, new_interval_days, new_easiness_factor";

/// Columns added to older databases, with their definitions.
const SCHEDULING_COLUMNS: [(&str, &str); 4] = [
    ("repetitions", "INTEGER NOT NULL DEFAULT 0"),
    ("easiness_factor", "REAL NOT NULL DEFAULT 2.5"),
    ("interval_days", "INTEGER NOT NULL DEFAULT 0"),
    ("next_review_date", "INTEGER"),
];

/// Counts reported after an import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub cards: usize,
    pub reviews: usize,
}

/// Card store and review ledger over one SQLite connection.
///
/// The connection sits behind a mutex, so card updates are serialized.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Creates missing tables and columns on `conn`.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_database(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-update leaves SQLite rolled back, so the connection is still usable.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validates and stores a new, never-scheduled card.
    pub fn add_card(&self, card: &NewFlashcard, now: DateTime<Utc>) -> Result<Flashcard> {
        let question = card.question.trim();
        let answer = card.answer.trim();
        if question.is_empty() || answer.is_empty() {
            return Err(FlashcardError::InvalidParameter(
                "question and answer required".to_string(),
            ));
        }

        let stored = Flashcard {
            id: 0,
            question: question.to_string(),
            answer: answer.to_string(),
            subject: normalize_optional(card.subject.as_deref()),
            tags: normalize_optional(card.tags.as_deref()),
            difficulty: normalize_optional(card.difficulty.as_deref()),
            created_at: now,
            reps: 0,
            easiness: DEFAULT_EASINESS,
            interval: 0,
            next_review: None,
        };

        let conn = self.lock();
        let id = insert_card(&conn, &stored)?;
        log::info!("card {} created", id);
        Ok(Flashcard { id, ..stored })
    }

    /// Deletes a card together with its review history.
    pub fn delete_card(&self, id: i64) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM reviews WHERE card_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM flashcards WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(FlashcardError::NotFound(id));
        }
        tx.commit()?;
        log::info!("card {} deleted", id);
        Ok(())
    }

    /// Most recently created cards first.
    pub fn recent_cards(&self, limit: usize) -> Result<Vec<Flashcard>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM flashcards
             ORDER BY created_at DESC, id DESC LIMIT ?1"
        ))?;
        let cards = stmt
            .query_map(params![limit as i64], card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    /// Case-insensitive substring search over question and answer, newest first.
    pub fn search_cards(&self, text: &str) -> Result<Vec<Flashcard>> {
        let text = text.trim();
        if text.is_empty() {
            return self.all_cards();
        }
        let pattern = like_pattern(text);
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM flashcards
             WHERE question LIKE ?1 ESCAPE '\\' OR answer LIKE ?1 ESCAPE '\\'
             ORDER BY created_at DESC, id DESC"
        ))?;
        let cards = stmt
            .query_map(params![pattern], card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    /// Every card, newest first.
    pub fn all_cards(&self) -> Result<Vec<Flashcard>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM flashcards ORDER BY created_at DESC, id DESC"
        ))?;
        let cards = stmt
            .query_map([], card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    /// Every review, oldest first; equal times in insertion order.
    pub fn all_reviews(&self) -> Result<Vec<ReviewRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews ORDER BY reviewed_at ASC, id ASC"
        ))?;
        let reviews = stmt
            .query_map([], review_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reviews)
    }

    pub fn card_count(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM flashcards", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Inserts `cards` and `reviews` in one transaction.
    ///
    /// Card ids are reassigned; `reviews` reference the ids carried in `cards`
    /// and are re-pointed at the new ones. Reviews whose card is not in
    /// `cards` are dropped.
    pub fn import_batch(
        &self,
        cards: &[Flashcard],
        reviews: &[ReviewRecord],
    ) -> Result<ImportSummary> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let mut id_map = HashMap::new();
        for card in cards {
            let new_id = insert_card(&tx, card)?;
            id_map.insert(card.id, new_id);
        }

        let mut imported_reviews = 0;
        for review in reviews {
            let Some(&card_id) = id_map.get(&review.card_id) else {
                log::debug!("skipping review for unknown card {}", review.card_id);
                continue;
            };
            insert_review(&tx, &ReviewRecord { card_id, ..review.clone() })?;
            imported_reviews += 1;
        }

        tx.commit()?;
        let summary = ImportSummary {
            cards: cards.len(),
            reviews: imported_reviews,
        };
        log::info!(
            "imported {} cards and {} reviews",
            summary.cards,
            summary.reviews
        );
        Ok(summary)
    }
}

impl CardStore for SqliteStore {
    fn get(&self, id: i64) -> Result<Option<Flashcard>> {
        let conn = self.lock();
        get_card(&conn, id)
    }

    fn save(&self, card: &Flashcard) -> Result<()> {
        let conn = self.lock();
        save_card(&conn, card)
    }

    fn update_card<T, F>(&self, id: i64, f: F) -> Result<T>
    where
        F: FnOnce(&mut Flashcard) -> Result<T>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut card = get_card(&tx, id)?.ok_or(FlashcardError::NotFound(id))?;
        let result = f(&mut card)?;
        save_card(&tx, &card)?;
        tx.commit()?;
        Ok(result)
    }

    fn query(&self, query: &DueQuery) -> Result<Vec<Flashcard>> {
        let cutoff = query.due_cutoff().map(|t| t.timestamp_millis());
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM flashcards
             WHERE ?1 IS NULL OR next_review_date IS NULL OR next_review_date <= ?1"
        ))?;
        let candidates = stmt
            .query_map(params![cutoff], card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(query.apply(candidates))
    }

    fn distinct_subjects(&self) -> Result<BTreeSet<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT TRIM(subject) FROM flashcards
             WHERE subject IS NOT NULL AND TRIM(subject) <> ''",
        )?;
        let subjects = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(subjects)
    }

    fn all_tag_tokens(&self) -> Result<BTreeSet<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT tags FROM flashcards WHERE tags IS NOT NULL")?;
        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(raw
            .iter()
            .flat_map(|tags| split_tags(tags))
            .map(str::to_string)
            .collect())
    }
}

impl ReviewLedger for SqliteStore {
    fn append(&self, record: &ReviewRecord) -> Result<()> {
        let conn = self.lock();
        insert_review(&conn, record)
            .map_err(|e| FlashcardError::LedgerWrite(e.to_string()))
    }

    fn list_for(&self, card_id: i64) -> Result<Vec<ReviewRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE card_id = ?1
             ORDER BY reviewed_at DESC, id DESC"
        ))?;
        let reviews = stmt
            .query_map(params![card_id], review_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reviews)
    }
}

/// Creates tables if needed and brings older card tables up to date.
fn init_database(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS flashcards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            subject TEXT,
            tags TEXT,
            difficulty TEXT,
            created_at INTEGER NOT NULL,
            repetitions INTEGER NOT NULL DEFAULT 0,
            easiness_factor REAL NOT NULL DEFAULT 2.5,
            interval_days INTEGER NOT NULL DEFAULT 0,
            next_review_date INTEGER
        );

        CREATE TABLE IF NOT EXISTS reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id INTEGER NOT NULL,
            reviewed_at INTEGER NOT NULL,
            quality INTEGER NOT NULL,
            prior_repetitions INTEGER NOT NULL,
            prior_interval_days INTEGER NOT NULL,
            prior_easiness_factor REAL NOT NULL,
            new_repetitions INTEGER NOT NULL,
            new_interval_days INTEGER NOT NULL,
            new_easiness_factor REAL NOT NULL,
            FOREIGN KEY (card_id) REFERENCES flashcards(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_reviews_card ON reviews(card_id, reviewed_at);",
    )?;
    migrate_scheduling_columns(conn)?;
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_flashcards_next_review ON flashcards(next_review_date);",
    )?;
    Ok(())
}

fn migrate_scheduling_columns(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('flashcards')")?;
    let existing = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;
    drop(stmt);

    for (column, definition) in SCHEDULING_COLUMNS {
        if !existing.contains(column) {
            conn.execute(
                &format!("ALTER TABLE flashcards ADD COLUMN {column} {definition}"),
                [],
            )?;
            log::info!("added missing column flashcards.{}", column);
        }
    }

    let backfilled = conn.execute(
        "UPDATE flashcards SET
            repetitions = COALESCE(repetitions, 0),
            easiness_factor = MAX(COALESCE(easiness_factor, ?1), ?2),
            interval_days = COALESCE(interval_days, 0)
         WHERE repetitions IS NULL OR easiness_factor IS NULL OR interval_days IS NULL
            OR easiness_factor < ?2",
        params![DEFAULT_EASINESS, MIN_EASINESS],
    )?;
    if backfilled > 0 {
        log::info!("backfilled scheduling state for {} cards", backfilled);
    }
    Ok(())
}

fn get_card(conn: &Connection, id: i64) -> Result<Option<Flashcard>> {
    let card = conn
        .query_row(
            &format!("SELECT {CARD_COLUMNS} FROM flashcards WHERE id = ?1"),
            params![id],
            card_from_row,
        )
        .optional()?;
    Ok(card)
}

fn save_card(conn: &Connection, card: &Flashcard) -> Result<()> {
    let updated = conn.execute(
        "UPDATE flashcards
         SET repetitions = ?1, easiness_factor = ?2, interval_days = ?3, next_review_date = ?4
         WHERE id = ?5",
        params![
            card.reps,
            card.easiness,
            card.interval,
            card.next_review.map(|t| t.timestamp_millis()),
            card.id
        ],
    )?;
    if updated == 0 {
        return Err(FlashcardError::NotFound(card.id));
    }
    Ok(())
}

fn insert_card(conn: &Connection, card: &Flashcard) -> Result<i64> {
    conn.execute(
        "INSERT INTO flashcards
            (question, answer, subject, tags, difficulty, created_at,
             repetitions, easiness_factor, interval_days, next_review_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            card.question,
            card.answer,
            card.subject,
            card.tags,
            card.difficulty,
            card.created_at.timestamp_millis(),
            card.reps,
            card.easiness,
            card.interval,
            card.next_review.map(|t| t.timestamp_millis()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_review(conn: &Connection, record: &ReviewRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO reviews ({REVIEW_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            record.card_id,
            record.reviewed_at.timestamp_millis(),
            record.quality,
            record.prior.reps,
            record.prior.interval,
            record.prior.easiness,
            record.new.reps,
            record.new.interval,
            record.new.easiness,
        ],
    )?;
    Ok(())
}

fn card_from_row(row: &Row) -> rusqlite::Result<Flashcard> {
    Ok(Flashcard {
        id: row.get(0)?,
        question: row.get(1)?,
        answer: row.get(2)?,
        subject: row.get(3)?,
        tags: row.get(4)?,
        difficulty: row.get(5)?,
        created_at: timestamp_column(row, 6)?,
        reps: row.get(7)?,
        easiness: row.get(8)?,
        interval: row.get(9)?,
        next_review: row
            .get::<_, Option<i64>>(10)?
            .map(|ms| millis_to_datetime(10, ms))
            .transpose()?,
    })
}

fn review_from_row(row: &Row) -> rusqlite::Result<ReviewRecord> {
    Ok(ReviewRecord {
        card_id: row.get(0)?,
        reviewed_at: timestamp_column(row, 1)?,
        quality: row.get(2)?,
        prior: SchedulingSnapshot {
            reps: row.get(3)?,
            interval: row.get(4)?,
            easiness: row.get(5)?,
        },
        new: SchedulingSnapshot {
            reps: row.get(6)?,
            interval: row.get(7)?,
            easiness: row.get(8)?,
        },
    })
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    millis_to_datetime(idx, row.get(idx)?)
}

fn millis_to_datetime(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            Box::new(FromSqlError::OutOfRange(ms)),
        )
    })
}

/// LIKE pattern matching `text` anywhere, with wildcards in `text` escaped.
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
