//! Transactional relational storage for chainlink merge chains.
//!
//! The merge graph never talks to a database directly. It goes through two
//! traits:
//!
//! - [`EntityStore`] -- opens read and write transactions
//! - [`EntityTx`] -- the row operations available inside a transaction
//!
//! # Backends
//!
//! - [`SqliteEntityStore`] -- rusqlite-backed store over a file or an
//!   in-memory database
//!
//! # Design Rules
//!
//! 1. Every mutation happens inside [`EntityStore::transaction`]; an `Err`
//!    from the closure rolls the whole transaction back.
//! 2. An existing row only gains a `merge_target_id` through
//!    [`EntityTx::claim_merge_target`], which never overwrites a pointer.
//! 3. Child-row reassignment is one bulk `UPDATE` per association.
//! 4. Identifiers are validated and quoted before they reach SQL text; values
//!    are always bound as parameters.

pub mod config;
pub mod error;
pub mod query;
pub mod row;
pub mod schema;
pub mod sql;
pub mod sqlite;
pub mod traits;

pub use config::{JournalMode, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use query::{EntityQuery, Filter, Projection};
pub use row::EntityRow;
pub use schema::TableSchema;
pub use sql::Statement;
pub use sqlite::SqliteEntityStore;
pub use traits::{EntityStore, EntityTx};
