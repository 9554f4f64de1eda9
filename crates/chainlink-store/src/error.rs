use chainlink_types::{EntityId, TypeError};

/// Errors from entity store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Error reported by SQLite, including constraint violations.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An identifier or value failed validation.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// A column value could not be decoded into the requested type.
    #[error("cannot decode column #{index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: TypeError,
    },

    /// A row carries a different number of values than the schema has columns.
    #[error("row {id} has {actual} values, table {table} has {expected} columns")]
    ColumnCount {
        table: String,
        id: EntityId,
        expected: usize,
        actual: usize,
    },

    /// The table layout does not fit a mergeable entity.
    #[error("schema error: {0}")]
    Schema(String),
}

impl StoreError {
    /// Returns `true` for unique, foreign-key, check and not-null violations.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
