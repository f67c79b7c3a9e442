//! Application configuration
//!
//! Central location for configuration constants, query limits and the
//! environment-driven runtime configuration.

use std::path::PathBuf;

// ===== Storage =====

/// Environment variable naming the data directory
pub const DATA_DIR_ENV: &str = "EVERYNOTE_DATA_DIR";

/// Data directory used when the environment does not name one
pub const DEFAULT_DATA_DIR: &str = "data";

/// SQLite database file name inside the data directory
pub const DATABASE_FILE: &str = "every_note.db";

/// Busy timeout for SQLite connections in seconds
pub const DB_BUSY_TIMEOUT_SECS: u64 = 5;

/// Maximum pooled connections for the application pool
pub const DB_MAX_CONNECTIONS: u32 = 5;

// ===== Version History =====

/// Maximum number of snapshots returned by a version listing.
/// Storage itself is unbounded.
pub const VERSION_LIST_LIMIT: i64 = 50;

// ===== Search =====

/// Result count used when the caller does not ask for one
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Upper bound on search results per query
pub const MAX_SEARCH_LIMIT: u32 = 100;

/// Approximate number of tokens in a highlighted snippet
pub const SNIPPET_TOKENS: u32 = 48;

/// BM25 column weight for the title column
pub const TITLE_WEIGHT: f64 = 10.0;

/// BM25 column weight for the content column
pub const CONTENT_WEIGHT: f64 = 1.0;

/// Markers wrapped around matched terms in snippets
pub const HIGHLIGHT_OPEN: &str = "<mark>";
pub const HIGHLIGHT_CLOSE: &str = "</mark>";
pub const SNIPPET_ELLIPSIS: &str = "...";

// ===== Graph =====

/// Label used for graph nodes whose note has an empty title
pub const UNTITLED_LABEL: &str = "Untitled";

// ===== Tags =====

/// Color assigned to tags created without one
pub const DEFAULT_TAG_COLOR: &str = "#6366f1";

/// Runtime configuration resolved from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Read configuration from `EVERYNOTE_DATA_DIR`, falling back to `./data`
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        Self { data_dir }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_path_is_inside_data_dir() {
        let config = Config::new("/tmp/everynote");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/everynote").join(DATABASE_FILE)
        );
    }

    #[test]
    fn test_search_limits_are_ordered() {
        assert!(DEFAULT_SEARCH_LIMIT <= MAX_SEARCH_LIMIT);
        assert!(TITLE_WEIGHT > CONTENT_WEIGHT);
    }
}
