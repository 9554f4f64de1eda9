//! SQLite backend for [`EntityStore`].
//!
//! [`SqliteEntityStore`] owns one rusqlite [`Connection`] behind a `Mutex`.
//! Write transactions are opened with `BEGIN IMMEDIATE`, so the legality
//! checks a merge performs inside its transaction see the same state the
//! commit applies to, even when several processes share one database file.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, TransactionBehavior};
use tracing::{debug, info, trace, warn};

use chainlink_types::{EntityId, Value, MERGE_TARGET_COLUMN, PRIMARY_KEY_COLUMN};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::query::EntityQuery;
use crate::row::EntityRow;
use crate::schema::TableSchema;
use crate::sql::{self, quote_identifier, Statement};
use crate::traits::{EntityStore, EntityTx};

/// rusqlite-backed entity store.
pub struct SqliteEntityStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    config: StoreConfig,
}

impl SqliteEntityStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        configure(&conn, &config, true)?;
        debug!(path = %path.display(), "opened sqlite entity store");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
            config,
        })
    }

    /// A private in-memory database with the default configuration.
    pub fn in_memory() -> StoreResult<Self> {
        Self::in_memory_with(StoreConfig::default())
    }

    pub fn in_memory_with(config: StoreConfig) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn, &config, false)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
            config,
        })
    }

    /// Database file, or `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Run host-side SQL (table creation, migrations, fixtures) on the
    /// underlying connection.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }

    /// Add the `merge_target_id` column and its index to an existing table.
    ///
    /// Idempotent. Returns `true` if the column was added by this call.
    pub fn install_merge_column(&self, schema: &TableSchema) -> StoreResult<bool> {
        schema.validate()?;
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = table_columns(&tx, &schema.table)?;
        if existing.is_empty() {
            return Err(StoreError::Schema(format!(
                "table {:?} does not exist",
                schema.table
            )));
        }

        let added = if existing.iter().any(|c| c == MERGE_TARGET_COLUMN) {
            false
        } else {
            tx.execute(&sql::add_merge_column(schema)?, [])?;
            true
        };
        tx.execute(&sql::create_merge_index(schema)?, [])?;
        tx.commit()?;

        info!(table = %schema.table, added, "installed merge target column");
        Ok(added)
    }

    /// Build a [`TableSchema`] from the live table definition.
    ///
    /// Every column other than `id` and `merge_target_id` becomes an
    /// attribute column, in declaration order.
    pub fn describe_table(&self, table: &str) -> StoreResult<TableSchema> {
        let names = {
            let conn = self.lock()?;
            table_columns(&conn, table)?
        };
        if names.is_empty() {
            return Err(StoreError::Schema(format!("table {table:?} does not exist")));
        }
        if !names.iter().any(|c| c == PRIMARY_KEY_COLUMN) {
            return Err(StoreError::Schema(format!(
                "table {table:?} has no {PRIMARY_KEY_COLUMN:?} column"
            )));
        }

        let columns: Vec<String> = names
            .into_iter()
            .filter(|c| c != PRIMARY_KEY_COLUMN && c != MERGE_TARGET_COLUMN)
            .collect();
        let schema = TableSchema::new(table, columns);
        schema.validate()?;
        Ok(schema)
    }

    /// Lock the connection. A holder that panicked leaves the mutex
    /// poisoned; the guard is recovered and any transaction it left open is
    /// rolled back.
    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        match self.conn.lock() {
            Ok(conn) => Ok(conn),
            Err(poisoned) => {
                warn!("recovering store connection after a panic");
                self.conn.clear_poison();
                let conn = poisoned.into_inner();
                if !conn.is_autocommit() {
                    conn.execute_batch("ROLLBACK")?;
                }
                Ok(conn)
            }
        }
    }

    fn run<T, E, F>(&self, behavior: TransactionBehavior, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn EntityTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(behavior)
            .map_err(StoreError::from)?;

        let result = f(&SqliteTx { conn: &*tx });

        match result {
            Ok(value) => {
                tx.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl EntityStore for SqliteEntityStore {
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn EntityTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.run(TransactionBehavior::Deferred, f)
    }

    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn EntityTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.run(TransactionBehavior::Immediate, f)
    }
}

impl std::fmt::Debug for SqliteEntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEntityStore")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish()
    }
}

/// [`EntityTx`] over an open rusqlite transaction.
struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl SqliteTx<'_> {
    fn execute(&self, stmt: &Statement) -> StoreResult<usize> {
        trace!(sql = %stmt.sql, "execute");
        Ok(self.conn.execute(&stmt.sql, params_from_iter(bind(&stmt.params)))?)
    }
}

impl EntityTx for SqliteTx<'_> {
    fn fetch(&self, schema: &TableSchema, id: EntityId) -> StoreResult<Option<EntityRow>> {
        let rows = self.query(schema, &EntityQuery::ids([id]))?;
        Ok(rows.into_iter().next())
    }

    fn insert(&self, schema: &TableSchema, row: &EntityRow) -> StoreResult<()> {
        self.execute(&sql::insert(schema, row)?)?;
        Ok(())
    }

    fn update_attributes(&self, schema: &TableSchema, row: &EntityRow) -> StoreResult<()> {
        if let Some(stmt) = sql::update_attributes(schema, row)? {
            self.execute(&stmt)?;
        }
        Ok(())
    }

    fn update_columns(
        &self,
        schema: &TableSchema,
        row: &EntityRow,
        columns: &[usize],
    ) -> StoreResult<()> {
        if let Some(stmt) = sql::update_columns(schema, row, columns)? {
            self.execute(&stmt)?;
        }
        Ok(())
    }

    fn claim_merge_target(
        &self,
        schema: &TableSchema,
        source: EntityId,
        target: EntityId,
    ) -> StoreResult<bool> {
        let changed = self.execute(&sql::claim_merge_target(schema, source, target)?)?;
        Ok(changed == 1)
    }

    fn has_incoming(&self, schema: &TableSchema, id: EntityId) -> StoreResult<bool> {
        let stmt = sql::has_incoming(schema, id)?;
        trace!(sql = %stmt.sql, "query");
        let exists: bool = self.conn.query_row(
            &stmt.sql,
            params_from_iter(bind(&stmt.params)),
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn reassign_foreign_key(
        &self,
        table: &str,
        foreign_key: &str,
        from: EntityId,
        to: EntityId,
    ) -> StoreResult<u64> {
        let moved = self.execute(&sql::reassign_foreign_key(table, foreign_key, from, to)?)?;
        Ok(moved as u64)
    }

    fn query(&self, schema: &TableSchema, query: &EntityQuery) -> StoreResult<Vec<EntityRow>> {
        let stmt = sql::select(schema, query)?;
        trace!(sql = %stmt.sql, "query");
        let width = schema.columns.len();
        let mut prepared = self.conn.prepare(&stmt.sql)?;
        let rows = prepared.query_map(params_from_iter(bind(&stmt.params)), |row| {
            read_row(row, width)
        })?;
        let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn count(&self, schema: &TableSchema, query: &EntityQuery) -> StoreResult<u64> {
        let stmt = sql::count(schema, query)?;
        trace!(sql = %stmt.sql, "query");
        let n: i64 = self.conn.query_row(
            &stmt.sql,
            params_from_iter(bind(&stmt.params)),
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }
}

fn configure(conn: &Connection, config: &StoreConfig, file_backed: bool) -> StoreResult<()> {
    conn.busy_timeout(config.busy_timeout())?;
    conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;
    if file_backed {
        let mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            config.journal_mode.as_pragma(),
            |row| row.get(0),
        )?;
        debug!(journal_mode = %mode, "configured journal mode");
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> StoreResult<Vec<String>> {
    let quoted = quote_identifier(table)?;
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({quoted})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let names = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn read_row(row: &rusqlite::Row<'_>, width: usize) -> rusqlite::Result<EntityRow> {
    let id: i64 = row.get(0)?;
    let merge_target_id: Option<i64> = row.get(1)?;
    let mut values = Vec::with_capacity(width);
    for index in 0..width {
        values.push(from_sql(row.get_ref(index + 2)?));
    }
    Ok(EntityRow {
        id: EntityId::new(id),
        merge_target_id: merge_target_id.map(EntityId::new),
        values,
    })
}

fn bind(params: &[Value]) -> Vec<SqlValue> {
    params.iter().map(to_sql).collect()
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(r) => SqlValue::Real(*r),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

// Text that is not valid UTF-8 is kept as raw bytes.
fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::Text(text.to_owned()),
            Err(_) => Value::Blob(bytes.to_vec()),
        },
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}
