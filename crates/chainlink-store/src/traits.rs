use chainlink_types::EntityId;

use crate::error::{StoreError, StoreResult};
use crate::query::EntityQuery;
use crate::row::EntityRow;
use crate::schema::TableSchema;

/// Row operations available inside one storage transaction.
///
/// Everything read through an `EntityTx` reflects the transaction's own view,
/// including writes made earlier in the same transaction. Implementations
/// must never write `merge_target_id` outside [`claim_merge_target`] and
/// [`insert`].
///
/// [`claim_merge_target`]: EntityTx::claim_merge_target
/// [`insert`]: EntityTx::insert
pub trait EntityTx {
    /// Read one row by id.
    ///
    /// Returns `Ok(None)` if the row does not exist.
    fn fetch(&self, schema: &TableSchema, id: EntityId) -> StoreResult<Option<EntityRow>>;

    /// Insert a full row, including its merge pointer.
    fn insert(&self, schema: &TableSchema, row: &EntityRow) -> StoreResult<()>;

    /// Persist the attribute columns of `row`. The merge pointer is left alone.
    fn update_attributes(&self, schema: &TableSchema, row: &EntityRow) -> StoreResult<()>;

    /// Persist only the attribute columns at the given schema positions.
    /// An empty list writes nothing.
    fn update_columns(
        &self,
        schema: &TableSchema,
        row: &EntityRow,
        columns: &[usize],
    ) -> StoreResult<()>;

    /// Point `source` at `target` if `source` is still canonical.
    ///
    /// Returns `Ok(false)` when no row changed: the source is missing or
    /// already points somewhere. An existing pointer is never overwritten.
    fn claim_merge_target(
        &self,
        schema: &TableSchema,
        source: EntityId,
        target: EntityId,
    ) -> StoreResult<bool>;

    /// Whether any row has `merge_target_id == id`.
    fn has_incoming(&self, schema: &TableSchema, id: EntityId) -> StoreResult<bool>;

    /// Move every row of `table` whose `foreign_key` equals `from` over to
    /// `to` with a single bulk update. Returns the number of rows moved.
    fn reassign_foreign_key(
        &self,
        table: &str,
        foreign_key: &str,
        from: EntityId,
        to: EntityId,
    ) -> StoreResult<u64>;

    /// Run a filter query.
    fn query(&self, schema: &TableSchema, query: &EntityQuery) -> StoreResult<Vec<EntityRow>>;

    /// Count the rows a query would return.
    fn count(&self, schema: &TableSchema, query: &EntityQuery) -> StoreResult<u64>;
}

/// Transactional storage backend for mergeable entities.
///
/// Implementations must be thread-safe (`Send + Sync`). The closure passed to
/// [`read`](EntityStore::read) or [`transaction`](EntityStore::transaction)
/// decides the outcome: `Ok` commits, `Err` rolls back, so no partially
/// applied work is ever observable.
pub trait EntityStore: Send + Sync {
    /// Run `f` in a transaction that takes no write lock up front.
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn EntityTx) -> Result<T, E>,
        E: From<StoreError>;

    /// Run `f` in a transaction that holds the write lock from its first
    /// statement, so reads inside it cannot be invalidated by a concurrent
    /// writer before commit.
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn EntityTx) -> Result<T, E>,
        E: From<StoreError>;
}
