//! Immutable audit entry appended to the review ledger after every review action.
use super::SchedulingSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub card_id: i64,
    pub reviewed_at: DateTime<Utc>,
    /// Graded quality, or 0 for a snooze.
    pub quality: u8,
    pub prior: SchedulingSnapshot,
    pub new: SchedulingSnapshot,
}
