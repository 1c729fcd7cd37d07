pub mod due_selector;
pub mod flashcard;
pub mod review_action;
pub mod review_data;
pub mod review_record;
pub mod review_session;
pub mod sm2;

pub use due_selector::{DueFilter, DueQuery, StudyChoices};
pub use flashcard::{DEFAULT_EASINESS, Flashcard, MIN_EASINESS, NewFlashcard};
pub use review_action::{ErrorResponse, ReviewAction, ReviewRequest, ReviewResponse};
pub use review_data::SchedulingSnapshot;
pub use review_record::ReviewRecord;
pub use review_session::{ReviewOutcome, ReviewSession};
pub use sm2::Quality;
