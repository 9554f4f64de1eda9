//! Mapping between host entity types and storage rows.

use chainlink_store::{EntityRow, StoreResult, TableSchema};
use chainlink_types::EntityId;

/// A plain-data entity that participates in a merge graph.
///
/// The trait only converts to and from [`EntityRow`] and has no setter for
/// `merge_target_id`. The merge engine writes the pointer in storage and
/// hands back entities rebuilt with [`Entity::from_row`].
pub trait Entity: Clone + Send + Sync + Sized {
    fn id(&self) -> EntityId;

    fn merge_target_id(&self) -> Option<EntityId>;

    /// Attribute values in schema column order, plus id and pointer.
    fn to_row(&self) -> EntityRow;

    fn from_row(row: EntityRow) -> StoreResult<Self>;
}

/// An entity type whose table layout is known statically.
pub trait Table: Entity {
    fn schema() -> TableSchema;
}

impl Entity for EntityRow {
    fn id(&self) -> EntityId {
        self.id
    }

    fn merge_target_id(&self) -> Option<EntityId> {
        self.merge_target_id
    }

    fn to_row(&self) -> EntityRow {
        self.clone()
    }

    fn from_row(row: EntityRow) -> StoreResult<Self> {
        Ok(row)
    }
}
