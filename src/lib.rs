pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod models;

pub use config::Config;
pub use database::{CardStore, ReviewLedger, SqliteStore};
pub use error::{FlashcardError, Result};
pub use models::{
    DueFilter, Flashcard, NewFlashcard, Quality, ReviewAction, ReviewOutcome, ReviewRecord,
    ReviewRequest, ReviewResponse, ReviewSession, SchedulingSnapshot,
};
