use serde::{Deserialize, Serialize};

use chainlink_types::{EntityId, TypeError, Value};

use crate::error::{StoreError, StoreResult};

/// Storage shape of one mergeable row.
///
/// `values` line up with [`TableSchema::columns`](crate::TableSchema); `id`
/// and `merge_target_id` are kept out of `values` because the merge graph
/// reads them on every operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    pub id: EntityId,
    pub merge_target_id: Option<EntityId>,
    pub values: Vec<Value>,
}

impl EntityRow {
    /// A canonical (unmerged) row.
    pub fn new(id: EntityId, values: Vec<Value>) -> Self {
        Self {
            id,
            merge_target_id: None,
            values,
        }
    }

    /// Set the merge pointer, for seeding rows that were merged elsewhere.
    pub fn with_merge_target(mut self, target: EntityId) -> Self {
        self.merge_target_id = Some(target);
        self
    }

    pub fn is_merged(&self) -> bool {
        self.merge_target_id.is_some()
    }

    /// Positions of the values that differ from `before`.
    pub fn changed_columns(&self, before: &EntityRow) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(i, v)| before.values.get(*i) != Some(*v))
            .map(|(i, _)| i)
            .collect()
    }

    /// The value at `index`, or a decode error if the row is too short.
    pub fn value(&self, index: usize) -> StoreResult<&Value> {
        self.values.get(index).ok_or(StoreError::Decode {
            index,
            source: TypeError::ValueType {
                expected: "value",
                found: "missing column",
            },
        })
    }

    pub fn text(&self, index: usize) -> StoreResult<String> {
        self.decode(index, |v| v.as_text().map(str::to_string))
    }

    pub fn optional_text(&self, index: usize) -> StoreResult<Option<String>> {
        self.decode(index, |v| v.as_optional_text().map(|s| s.map(str::to_string)))
    }

    pub fn integer(&self, index: usize) -> StoreResult<i64> {
        self.decode(index, Value::as_integer)
    }

    pub fn real(&self, index: usize) -> StoreResult<f64> {
        self.decode(index, Value::as_real)
    }

    /// Booleans come back from SQLite as `0`/`1`; a null reads as `false`.
    pub fn bool(&self, index: usize) -> StoreResult<bool> {
        self.decode(index, |v| if v.is_null() { Ok(false) } else { v.as_bool() })
    }

    fn decode<T>(
        &self,
        index: usize,
        f: impl FnOnce(&Value) -> Result<T, TypeError>,
    ) -> StoreResult<T> {
        f(self.value(index)?).map_err(|source| StoreError::Decode { index, source })
    }
}
