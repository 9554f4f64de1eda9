//! Test entity and database setup shared by the graph tests.

use std::sync::Arc;

use chainlink_store::{EntityRow, SqliteEntityStore, StoreConfig, StoreResult, TableSchema};
use chainlink_types::{EntityId, Value};

use crate::entity::{Entity, Table};
use crate::graph::MergeGraph;

pub(crate) const ARTISTS_DDL: &str = "
    CREATE TABLE artists (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        imported INTEGER NOT NULL DEFAULT 0,
        merge_target_id INTEGER REFERENCES artists(id)
    );
    CREATE INDEX index_artists_on_merge_target_id ON artists (merge_target_id);";

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Artist {
    pub id: EntityId,
    pub merge_target_id: Option<EntityId>,
    pub name: String,
    pub imported: bool,
}

impl Artist {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id: EntityId::new(id),
            merge_target_id: None,
            name: name.to_string(),
            imported: false,
        }
    }

    pub fn merged_into(mut self, target: i64) -> Self {
        self.merge_target_id = Some(EntityId::new(target));
        self
    }
}

impl Entity for Artist {
    fn id(&self) -> EntityId {
        self.id
    }

    fn merge_target_id(&self) -> Option<EntityId> {
        self.merge_target_id
    }

    fn to_row(&self) -> EntityRow {
        EntityRow {
            id: self.id,
            merge_target_id: self.merge_target_id,
            values: vec![Value::from(self.name.as_str()), Value::Bool(self.imported)],
        }
    }

    fn from_row(row: EntityRow) -> StoreResult<Self> {
        Ok(Self {
            name: row.text(0)?,
            imported: row.bool(1)?,
            id: row.id,
            merge_target_id: row.merge_target_id,
        })
    }
}

impl Table for Artist {
    fn schema() -> TableSchema {
        TableSchema::new("artists", ["name", "imported"])
    }
}

pub(crate) type ArtistGraph = MergeGraph<Artist, SqliteEntityStore>;

pub(crate) fn graph_with(config: StoreConfig) -> ArtistGraph {
    let store = SqliteEntityStore::in_memory_with(config).unwrap();
    store.with_connection(|c| c.execute_batch(ARTISTS_DDL)).unwrap();
    MergeGraph::new(Arc::new(store)).unwrap()
}

pub(crate) fn graph() -> ArtistGraph {
    graph_with(StoreConfig::default())
}

/// Insert artists in order; merged ones must come after their targets.
pub(crate) fn seed(graph: &ArtistGraph, artists: &[Artist]) {
    for artist in artists {
        graph.insert(artist).unwrap();
    }
}
