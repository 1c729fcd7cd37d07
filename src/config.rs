//! Runtime settings for the command-line front end.

use crate::database::SqliteStore;
use crate::error::Result;
use crate::models::due_selector::DEFAULT_STUDY_LIMIT;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_PATH: &str = "flashcards.sqlite3";
pub const DEFAULT_DASHBOARD_LIMIT: usize = 20;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    /// Maximum cards returned by a study query when no limit is given.
    pub study_limit: usize,
    /// Number of recent cards listed by default.
    pub dashboard_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            study_limit: DEFAULT_STUDY_LIMIT,
            dashboard_limit: DEFAULT_DASHBOARD_LIMIT,
        }
    }
}

impl Config {
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn open_store(&self) -> Result<SqliteStore> {
        log::info!("opening card store at {}", self.database_path.display());
        SqliteStore::open(&self.database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::CardStore;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database_path, PathBuf::from("flashcards.sqlite3"));
        assert_eq!(config.study_limit, 200);
        assert_eq!(config.dashboard_limit, 20);
    }

    #[test]
    fn test_open_store_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.sqlite3");
        let config = Config::default().with_database_path(&path);

        let store = config.open_store().unwrap();
        assert!(path.exists());
        assert!(store.distinct_subjects().unwrap().is_empty());
    }
}
