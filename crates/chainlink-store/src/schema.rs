//! Table layout of a mergeable entity type.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use chainlink_types::{
    validate_identifier, MERGE_TARGET_COLUMN, MERGE_TARGET_JOIN_PREFIX, PRIMARY_KEY_COLUMN,
};

use crate::error::{StoreError, StoreResult};
use crate::row::EntityRow;

/// Names the table of a mergeable entity type and its attribute columns.
///
/// Every mergeable table has an integer `id` primary key and a nullable
/// `merge_target_id` referencing `id` in the same table. `columns` lists the
/// remaining columns in the order [`EntityRow::values`] uses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<String>,
}

impl TableSchema {
    pub fn new<I, C>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Alias the table takes when joined to itself (`merge_target_<table>`).
    pub fn join_alias(&self) -> String {
        format!("{MERGE_TARGET_JOIN_PREFIX}{}", self.table)
    }

    /// Name of the index created on `merge_target_id`.
    pub fn merge_index_name(&self) -> String {
        format!("index_{}_on_{MERGE_TARGET_COLUMN}", self.table)
    }

    /// Position of `column` within [`EntityRow::values`].
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Check every identifier, including the derived join alias and index name.
    pub fn validate(&self) -> StoreResult<()> {
        validate_identifier(&self.table)?;
        validate_identifier(&self.join_alias())?;
        validate_identifier(&self.merge_index_name())?;

        let mut seen = HashSet::new();
        for column in &self.columns {
            validate_identifier(column)?;
            if column == PRIMARY_KEY_COLUMN || column == MERGE_TARGET_COLUMN {
                return Err(StoreError::Schema(format!(
                    "column {column:?} of {} is managed by the merge graph and must not be listed",
                    self.table
                )));
            }
            if !seen.insert(column.as_str()) {
                return Err(StoreError::Schema(format!(
                    "column {column:?} listed twice for {}",
                    self.table
                )));
            }
        }
        Ok(())
    }

    /// Reject rows whose value count does not match the column list.
    pub fn check_row(&self, row: &EntityRow) -> StoreResult<()> {
        if row.values.len() != self.columns.len() {
            return Err(StoreError::ColumnCount {
                table: self.table.clone(),
                id: row.id,
                expected: self.columns.len(),
                actual: row.values.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlink_types::{EntityId, Value};

    fn artists() -> TableSchema {
        TableSchema::new("artists", ["name", "imported"])
    }

    #[test]
    fn derived_names() {
        let s = artists();
        assert_eq!(s.join_alias(), "merge_target_artists");
        assert_eq!(s.merge_index_name(), "index_artists_on_merge_target_id");
        assert_eq!(s.column_index("imported"), Some(1));
        assert_eq!(s.column_index("missing"), None);
    }

    #[test]
    fn validate_accepts_plain_schema() {
        artists().validate().unwrap();
        TableSchema::new("tags", Vec::<String>::new()).validate().unwrap();
    }

    #[test]
    fn validate_rejects_managed_and_duplicate_columns() {
        let managed = TableSchema::new("artists", ["name", "merge_target_id"]);
        assert!(matches!(managed.validate(), Err(StoreError::Schema(_))));

        let dup = TableSchema::new("artists", ["name", "name"]);
        assert!(matches!(dup.validate(), Err(StoreError::Schema(_))));

        let bad = TableSchema::new("artists; drop", ["name"]);
        assert!(matches!(bad.validate(), Err(StoreError::Type(_))));
    }

    #[test]
    fn validate_rejects_table_whose_alias_overflows() {
        let long = TableSchema::new("a".repeat(55), ["name"]);
        assert!(long.validate().is_err());
    }

    #[test]
    fn check_row_counts_values() {
        let s = artists();
        let good = EntityRow::new(EntityId::new(1), vec![Value::from("x"), Value::Bool(false)]);
        s.check_row(&good).unwrap();

        let short = EntityRow::new(EntityId::new(2), vec![Value::from("x")]);
        assert!(matches!(
            s.check_row(&short),
            Err(StoreError::ColumnCount {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }
}
