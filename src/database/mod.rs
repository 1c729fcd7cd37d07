pub mod db;
pub mod store;

pub use db::{ImportSummary, SqliteStore};
pub use store::{CardStore, ReviewLedger};
