//! The [`MergeGraph`] service.
//!
//! A `MergeGraph` is parameterized over the entity type and the store that
//! holds it. It keeps no in-memory copy of the graph: every question about
//! incoming merges or chain targets is answered by a query against
//! committed storage.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use chainlink_store::{EntityQuery, EntityRow, EntityStore, EntityTx, TableSchema};
use chainlink_types::{EntityId, MergeRole, MERGE_TARGET_COLUMN};

use crate::config::GraphConfig;
use crate::entity::{Entity, Table};
use crate::error::{GraphError, GraphResult};
use crate::resolve::resolve_row;

/// Read-side service over one mergeable table.
pub struct MergeGraph<E, S> {
    store: Arc<S>,
    schema: TableSchema,
    config: GraphConfig,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S> Clone for MergeGraph<E, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            schema: self.schema.clone(),
            config: self.config.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Table, S: EntityStore> MergeGraph<E, S> {
    /// Graph over the entity's statically declared table.
    pub fn new(store: Arc<S>) -> GraphResult<Self> {
        Self::with_schema(store, E::schema(), GraphConfig::default())
    }
}

impl<E: Entity, S: EntityStore> MergeGraph<E, S> {
    /// Graph over an explicitly described table.
    pub fn with_schema(store: Arc<S>, schema: TableSchema, config: GraphConfig) -> GraphResult<Self> {
        schema.validate()?;
        Ok(Self {
            store,
            schema,
            config,
            _entity: PhantomData,
        })
    }

    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // Predicates
    // ---------------------------------------------------------------

    /// Whether `entity` has been folded into another row.
    pub fn is_merged(&self, entity: &E) -> bool {
        entity.merge_target_id().is_some()
    }

    /// Whether any row points at `entity` as its merge target.
    pub fn has_incoming_merges(&self, entity: &E) -> GraphResult<bool> {
        let id = entity.id();
        self.store
            .read(|tx| self.has_incoming_merges_in(tx, id))
    }

    /// A source must be canonical and must not have been merged into.
    pub fn is_mergeable_as_source(&self, entity: &E) -> GraphResult<bool> {
        if self.is_merged(entity) {
            return Ok(false);
        }
        Ok(!self.has_incoming_merges(entity)?)
    }

    /// A target must be canonical. It may already have sources.
    pub fn is_mergeable_as_target(&self, entity: &E) -> bool {
        !self.is_merged(entity)
    }

    pub fn is_mergeable(&self, entity: &E, role: MergeRole) -> GraphResult<bool> {
        match role {
            MergeRole::Source => self.is_mergeable_as_source(entity),
            MergeRole::Target => Ok(self.is_mergeable_as_target(entity)),
        }
    }

    /// [`has_incoming_merges`](Self::has_incoming_merges) inside an open
    /// transaction.
    pub fn has_incoming_merges_in(&self, tx: &dyn EntityTx, id: EntityId) -> GraphResult<bool> {
        Ok(tx.has_incoming(&self.schema, id)?)
    }

    // ---------------------------------------------------------------
    // Row access
    // ---------------------------------------------------------------

    pub fn find(&self, id: EntityId) -> GraphResult<Option<E>> {
        self.store.read(|tx| self.find_in(tx, id))
    }

    pub fn find_in(&self, tx: &dyn EntityTx, id: EntityId) -> GraphResult<Option<E>> {
        tx.fetch(&self.schema, id)?
            .map(E::from_row)
            .transpose()
            .map_err(GraphError::from)
    }

    /// Like [`find_in`](Self::find_in) but a missing row is an error.
    pub fn fetch_in(&self, tx: &dyn EntityTx, id: EntityId) -> GraphResult<E> {
        self.find_in(tx, id)?.ok_or_else(|| self.not_found(id))
    }

    /// Re-read `entity` from storage.
    pub fn reload(&self, entity: &E) -> GraphResult<E> {
        self.store.read(|tx| self.fetch_in(tx, entity.id()))
    }

    /// Insert a new row.
    ///
    /// A row may be created already pointing at a target, for importing
    /// merge state recorded elsewhere; the target must exist. Existing rows
    /// only ever gain a pointer through the merge engine.
    pub fn insert(&self, entity: &E) -> GraphResult<()> {
        let row = entity.to_row();
        self.store.transaction(|tx| {
            if let Some(target) = row.merge_target_id {
                if target == row.id || tx.fetch(&self.schema, target)?.is_none() {
                    return Err(self.not_found(target));
                }
            }
            tx.insert(&self.schema, &row)?;
            Ok(())
        })
    }

    /// Run a query, returning entities.
    pub fn fetch_all(&self, query: &EntityQuery) -> GraphResult<Vec<E>> {
        self.store.read(|tx| self.fetch_all_in(tx, query))
    }

    pub fn fetch_all_in(&self, tx: &dyn EntityTx, query: &EntityQuery) -> GraphResult<Vec<E>> {
        tx.query(&self.schema, query)?
            .into_iter()
            .map(|row| E::from_row(row).map_err(GraphError::from))
            .collect()
    }

    pub fn count(&self, query: &EntityQuery) -> GraphResult<u64> {
        self.store.read(|tx| Ok(tx.count(&self.schema, query)?))
    }

    // ---------------------------------------------------------------
    // Resolution
    // ---------------------------------------------------------------

    /// The canonical entity `entity` resolves to, following the whole chain.
    ///
    /// Returns `entity` itself when it is not merged, and `Ok(None)` when the
    /// chain ends in a dangling reference (reported through `tracing`). A
    /// cycle or an over-long chain fails with an integrity error.
    pub fn resolve_target(&self, entity: &E) -> GraphResult<Option<E>> {
        if !self.is_merged(entity) {
            return Ok(Some(entity.clone()));
        }
        self.store.read(|tx| self.resolve_target_in(tx, entity))
    }

    pub fn resolve_target_in(&self, tx: &dyn EntityTx, entity: &E) -> GraphResult<Option<E>> {
        let resolution = resolve_row(
            tx,
            &self.schema,
            entity.to_row(),
            self.config.max_resolution_hops,
        )?;
        resolution
            .canonical
            .map(E::from_row)
            .transpose()
            .map_err(GraphError::from)
    }

    /// Ids visited while resolving `entity`, starting with its own.
    ///
    /// A dangling chain returns the ids up to the missing row.
    pub fn trace_chain(&self, entity: &E) -> GraphResult<Vec<EntityId>> {
        let row = entity.to_row();
        self.store.read(|tx| {
            let resolution = resolve_row(tx, &self.schema, row, self.config.max_resolution_hops)?;
            Ok(resolution.path)
        })
    }

    // ---------------------------------------------------------------
    // Bulk queries
    // ---------------------------------------------------------------

    /// Rewrite `query` to return each match's immediate merge target.
    ///
    /// The table is joined to itself on
    /// `target.id = COALESCE(row.merge_target_id, row.id)` and the joined
    /// rows are projected, so the whole result set resolves in one round
    /// trip. This resolves exactly one hop: in a chain `target <- mid <- leaf`
    /// a query matching `leaf` yields `mid`. Use
    /// [`resolve_target`](Self::resolve_target) per row when chains may be
    /// deeper.
    pub fn as_canonical(&self, query: EntityQuery) -> EntityQuery {
        query.canonical()
    }

    /// Run [`as_canonical`](Self::as_canonical) for `query`.
    pub fn canonical(&self, query: EntityQuery) -> GraphResult<Vec<E>> {
        let query = self.as_canonical(query);
        self.fetch_all(&query)
    }

    /// One-hop canonical lookup of a single id.
    pub fn find_canonical(&self, id: EntityId) -> GraphResult<Option<E>> {
        let rows = self.canonical(EntityQuery::ids([id]))?;
        Ok(rows.into_iter().next())
    }

    /// Query matching canonical rows.
    pub fn targets_query(&self) -> EntityQuery {
        EntityQuery::all().where_null(MERGE_TARGET_COLUMN)
    }

    /// Query matching merged rows.
    pub fn sources_query(&self) -> EntityQuery {
        EntityQuery::all().where_not_null(MERGE_TARGET_COLUMN)
    }

    /// All canonical rows. Together with [`sources`](Self::sources) this
    /// partitions the table.
    pub fn targets(&self) -> GraphResult<Vec<E>> {
        self.fetch_all(&self.targets_query())
    }

    /// All merged rows.
    pub fn sources(&self) -> GraphResult<Vec<E>> {
        self.fetch_all(&self.sources_query())
    }

    /// Rows merged directly into `entity`.
    pub fn sources_of(&self, entity: &E) -> GraphResult<Vec<E>> {
        let query = EntityQuery::all().where_eq(MERGE_TARGET_COLUMN, entity.id().get());
        let found = self.fetch_all(&query)?;
        debug!(table = %self.schema.table, id = %entity.id(), sources = found.len(), "listed direct sources");
        Ok(found)
    }

    pub fn not_found(&self, id: EntityId) -> GraphError {
        GraphError::NotFound {
            table: self.schema.table.clone(),
            id,
        }
    }
}

impl<S: EntityStore> MergeGraph<EntityRow, S> {
    /// Graph over a table described at runtime, working on raw rows.
    pub fn dynamic(store: Arc<S>, schema: TableSchema, config: GraphConfig) -> GraphResult<Self> {
        Self::with_schema(store, schema, config)
    }
}
