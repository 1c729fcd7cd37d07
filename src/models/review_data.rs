use serde::{Deserialize, Serialize};

/// Card scheduling fields captured before or after a review.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulingSnapshot {
    pub reps: u32,
    pub interval: u32,
    pub easiness: f64,
}
