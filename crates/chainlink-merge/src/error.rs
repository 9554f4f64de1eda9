use std::fmt;

use serde::{Deserialize, Serialize};

use chainlink_graph::{GraphError, IntegrityError};
use chainlink_store::StoreError;
use chainlink_types::{EntityId, MergeRole};

/// Which legality rule a rejected merge broke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionViolation {
    /// The record already points at a merge target.
    AlreadyMerged,
    /// Other records point at this one, so it cannot become a source.
    HasIncomingMerges,
    /// Source and target are the same record.
    SelfMerge,
    /// Another transaction set the source's pointer first.
    ConcurrentMerge,
}

impl fmt::Display for DirectionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyMerged => "already merged into another record",
            Self::HasIncomingMerges => "other records are merged into it",
            Self::SelfMerge => "cannot be merged into itself",
            Self::ConcurrentMerge => "merged by a concurrent transaction",
        })
    }
}

/// Errors from merge operations.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// A legality rule rejected the merge. Nothing was written.
    #[error("cannot merge {role} {table} {id}: {violation}")]
    Direction {
        table: String,
        role: MergeRole,
        id: EntityId,
        violation: DirectionViolation,
    },

    /// Unknown or invalid association.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{table} row {id} not found")]
    NotFound { table: String, id: EntityId },
}

impl MergeError {
    /// The broken rule, for direction errors.
    pub fn violation(&self) -> Option<DirectionViolation> {
        match self {
            Self::Direction { violation, .. } => Some(*violation),
            _ => None,
        }
    }

    pub fn is_direction(&self) -> bool {
        matches!(self, Self::Direction { .. })
    }
}

impl From<GraphError> for MergeError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::Store(e) => Self::Store(e),
            GraphError::Integrity(e) => Self::Integrity(e),
            GraphError::NotFound { table, id } => Self::NotFound { table, id },
        }
    }
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_message_names_side_and_rule() {
        let err = MergeError::Direction {
            table: "artists".into(),
            role: MergeRole::Target,
            id: EntityId::new(4),
            violation: DirectionViolation::AlreadyMerged,
        };
        assert_eq!(
            err.to_string(),
            "cannot merge target artists 4: already merged into another record"
        );
        assert_eq!(err.violation(), Some(DirectionViolation::AlreadyMerged));
    }

    #[test]
    fn graph_errors_keep_their_kind() {
        let err: MergeError = GraphError::NotFound {
            table: "artists".into(),
            id: EntityId::new(1),
        }
        .into();
        assert!(matches!(err, MergeError::NotFound { .. }));
        assert!(!err.is_direction());
    }
}
