use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier {name:?}: {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),

    #[error("value type mismatch: expected {expected}, found {found}")]
    ValueType {
        expected: &'static str,
        found: &'static str,
    },
}
