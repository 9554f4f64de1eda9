//! Dependent-record associations reassigned when their owner is merged away.

use std::fmt;

use serde::{Deserialize, Serialize};

use chainlink_types::validate_identifier;

use crate::error::{MergeError, MergeResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// Many child rows per owner. Reassigned with one bulk update.
    Collection,
    /// At most one child row per owner. Never reassigned: moving it could
    /// leave the target with two.
    Singular,
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Collection => "collection",
            Self::Singular => "singular",
        })
    }
}

/// A statically declared relation from child rows to a mergeable owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub name: String,
    pub kind: AssociationKind,
    /// Child table.
    pub table: String,
    /// Column of `table` holding the owner's id.
    pub foreign_key: String,
}

impl Association {
    pub fn collection(
        name: impl Into<String>,
        table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::Collection,
            table: table.into(),
            foreign_key: foreign_key.into(),
        }
    }

    pub fn singular(
        name: impl Into<String>,
        table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::Singular,
            table: table.into(),
            foreign_key: foreign_key.into(),
        }
    }

    /// Check that the table and column names are safe SQL identifiers.
    pub fn validate(&self) -> MergeResult<()> {
        if self.name.trim().is_empty() {
            return Err(MergeError::Configuration(
                "association name must not be empty".into(),
            ));
        }
        for ident in [&self.table, &self.foreign_key] {
            validate_identifier(ident).map_err(|e| {
                MergeError::Configuration(format!("association {:?}: {e}", self.name))
            })?;
        }
        Ok(())
    }
}

/// Rows moved for one association during a merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub association: String,
    pub kind: AssociationKind,
    pub moved: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind() {
        let a = Association::collection("events", "events", "venue_id");
        assert_eq!(a.kind, AssociationKind::Collection);
        assert!(a.validate().is_ok());

        let b = Association::singular("profile", "venue_profiles", "venue_id");
        assert_eq!(b.kind, AssociationKind::Singular);
        assert_eq!(b.kind.to_string(), "singular");
    }

    #[test]
    fn unsafe_identifiers_are_configuration_errors() {
        let bad = Association::collection("events", "events; DROP TABLE x", "venue_id");
        assert!(matches!(bad.validate(), Err(MergeError::Configuration(_))));

        let unnamed = Association::collection(" ", "events", "venue_id");
        assert!(matches!(unnamed.validate(), Err(MergeError::Configuration(_))));
    }
}
