//! Error types shared by the scheduling core and its storage collaborators.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlashcardError {
    /// Referenced card id does not exist
    #[error("card not found: {0}")]
    NotFound(i64),

    /// Unrecognized review action token
    #[error("unknown action: {0}")]
    InvalidAction(String),

    /// Malformed or out-of-range input (card id, snooze days, quality, card content)
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Card store write or read failed
    #[error("persistence failure: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Next due date falls past the last date chrono can represent
    #[error("card {card_id}: interval of {interval} days overflows the calendar")]
    ScheduleOverflow { card_id: i64, interval: u32 },

    /// Review ledger append failed after the card was already committed
    #[error("ledger write failure: {0}")]
    LedgerWrite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlashcardError {
    /// HTTP-style status used by the JSON review protocol.
    pub fn status_code(&self) -> u16 {
        match self {
            FlashcardError::NotFound(_) => 404,
            FlashcardError::InvalidAction(_) | FlashcardError::InvalidParameter(_) => 400,
            _ => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

pub type Result<T> = std::result::Result<T, FlashcardError>;
