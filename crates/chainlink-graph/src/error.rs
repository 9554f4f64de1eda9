use chainlink_store::StoreError;
use chainlink_types::EntityId;

/// Corrupted merge state, detected while reading or writing the graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("merge cycle in {table}: chain starting at {start} revisits {revisited}")]
    Cycle {
        table: String,
        start: EntityId,
        revisited: EntityId,
    },

    #[error("merge chain in {table} starting at {start} exceeds {limit} hops")]
    HopLimit {
        table: String,
        start: EntityId,
        limit: usize,
    },

    #[error("{table} row {id} points at missing merge target {target}")]
    DanglingReference {
        table: String,
        id: EntityId,
        target: EntityId,
    },

    #[error("merge callback changed the {field} of {table} row {id}")]
    IdentityMutated {
        table: String,
        id: EntityId,
        field: &'static str,
    },
}

/// Errors produced by merge graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("{table} row {id} not found")]
    NotFound { table: String, id: EntityId },
}

impl From<chainlink_types::TypeError> for GraphError {
    fn from(e: chainlink_types::TypeError) -> Self {
        Self::Store(StoreError::Type(e))
    }
}

/// Convenience alias for merge graph results.
pub type GraphResult<T> = Result<T, GraphError>;
