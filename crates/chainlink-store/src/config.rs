use std::time::Duration;

use serde::{Deserialize, Serialize};

/// SQLite journal mode applied to file-backed databases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Delete,
    #[default]
    Wal,
}

impl JournalMode {
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Wal => "WAL",
        }
    }
}

/// Connection settings for [`SqliteEntityStore`](crate::SqliteEntityStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long a writer waits for a competing write transaction to finish.
    pub busy_timeout_ms: u64,
    /// Enforce `merge_target_id` and child foreign keys at the SQLite level.
    pub foreign_keys: bool,
    /// Ignored for in-memory databases.
    pub journal_mode: JournalMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            foreign_keys: true,
            journal_mode: JournalMode::Wal,
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.busy_timeout(), Duration::from_secs(5));
        assert!(c.foreign_keys);
        assert_eq!(c.journal_mode, JournalMode::Wal);
        assert_eq!(c.journal_mode.as_pragma(), "WAL");
    }
}
