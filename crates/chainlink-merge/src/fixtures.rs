//! Venues with events (collection) and a profile (singular).

use std::path::Path;
use std::sync::Arc;

use chainlink_graph::{Entity, MergeGraph, Table};
use chainlink_store::{EntityRow, SqliteEntityStore, StoreConfig, StoreResult, TableSchema};
use chainlink_types::{EntityId, Value};

use crate::association::Association;
use crate::engine::MergeEngine;

pub(crate) const SCHEMA_DDL: &str = "
    CREATE TABLE IF NOT EXISTS venues (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        city TEXT,
        merge_target_id INTEGER REFERENCES venues(id)
    );
    CREATE INDEX IF NOT EXISTS index_venues_on_merge_target_id ON venues (merge_target_id);
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY,
        venue_id INTEGER REFERENCES venues(id),
        title TEXT
    );
    CREATE TABLE IF NOT EXISTS venue_profiles (
        id INTEGER PRIMARY KEY,
        venue_id INTEGER UNIQUE REFERENCES venues(id),
        bio TEXT
    );";

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Venue {
    pub id: EntityId,
    pub merge_target_id: Option<EntityId>,
    pub name: String,
    pub city: Option<String>,
}

impl Venue {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id: EntityId::new(id),
            merge_target_id: None,
            name: name.to_string(),
            city: None,
        }
    }
}

impl Entity for Venue {
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
            values: vec![Value::from(self.name.as_str()), Value::from(self.city.clone())],
        }
    }

    fn from_row(row: EntityRow) -> StoreResult<Self> {
        Ok(Self {
            name: row.text(0)?,
            city: row.optional_text(1)?,
            id: row.id,
            merge_target_id: row.merge_target_id,
        })
    }
}

impl Table for Venue {
    fn schema() -> TableSchema {
        TableSchema::new("venues", ["name", "city"])
    }
}

pub(crate) type VenueEngine = MergeEngine<Venue, SqliteEntityStore>;

pub(crate) fn associations() -> Vec<Association> {
    vec![
        Association::collection("events", "events", "venue_id"),
        Association::singular("profile", "venue_profiles", "venue_id"),
    ]
}

fn engine_on(store: SqliteEntityStore) -> VenueEngine {
    store.with_connection(|c| c.execute_batch(SCHEMA_DDL)).unwrap();
    let graph = MergeGraph::new(Arc::new(store)).unwrap();
    MergeEngine::with_associations(graph, associations()).unwrap()
}

pub(crate) fn engine() -> VenueEngine {
    engine_on(SqliteEntityStore::in_memory().unwrap())
}

/// An engine on its own connection to a database file.
pub(crate) fn engine_at(path: &Path) -> VenueEngine {
    engine_on(SqliteEntityStore::open(path, StoreConfig::default()).unwrap())
}

pub(crate) fn seed_venues(engine: &VenueEngine, venues: &[Venue]) {
    for venue in venues {
        engine.graph().insert(venue).unwrap();
    }
}

pub(crate) fn add_events(engine: &VenueEngine, venue: i64, count: usize) {
    engine
        .graph()
        .store()
        .with_connection(|c| {
            for i in 0..count {
                c.execute(
                    "INSERT INTO events (venue_id, title) VALUES (?1, ?2)",
                    (venue, format!("show {i}")),
                )?;
            }
            Ok(())
        })
        .unwrap();
}

pub(crate) fn events_of(engine: &VenueEngine, venue: i64) -> i64 {
    engine
        .graph()
        .store()
        .with_connection(|c| {
            c.query_row(
                "SELECT COUNT(*) FROM events WHERE venue_id = ?1",
                [venue],
                |row| row.get(0),
            )
        })
        .unwrap()
}

pub(crate) fn load(engine: &VenueEngine, id: i64) -> Venue {
    engine.graph().find(EntityId::new(id)).unwrap().unwrap()
}
