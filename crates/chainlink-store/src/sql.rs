//! SQL text rendering.
//!
//! Every identifier goes through [`quote_identifier`], which validates it
//! before wrapping it in double quotes. Values never appear in SQL text; they
//! are returned in [`Statement::params`] and bound positionally (`?`).

use chainlink_types::{validate_identifier, EntityId, Value, MERGE_TARGET_COLUMN, PRIMARY_KEY_COLUMN};

use crate::error::{StoreError, StoreResult};
use crate::query::{EntityQuery, Filter, Projection};
use crate::row::EntityRow;
use crate::schema::TableSchema;

/// SQL text plus its positional parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }
}

/// Validate `name` and quote it as a SQL identifier.
pub fn quote_identifier(name: &str) -> StoreResult<String> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// `SELECT` for [`EntityQuery`], projecting `id, merge_target_id, columns...`.
///
/// For [`Projection::Canonical`] the table is joined to itself:
///
/// ```sql
/// INNER JOIN "t" AS "merge_target_t"
///   ON "merge_target_t"."id" = COALESCE("t"."merge_target_id", "t"."id")
/// ```
///
/// and the joined rows are returned. This resolves exactly one hop.
pub fn select(schema: &TableSchema, query: &EntityQuery) -> StoreResult<Statement> {
    let table = quote_identifier(&schema.table)?;
    let id = quote_identifier(PRIMARY_KEY_COLUMN)?;
    let (from, projected) = from_clause(schema, query.projection())?;

    let mut columns = vec![
        format!("{projected}.{id}"),
        format!("{projected}.{}", quote_identifier(MERGE_TARGET_COLUMN)?),
    ];
    for column in &schema.columns {
        columns.push(format!("{projected}.{}", quote_identifier(column)?));
    }

    let (where_sql, params) = where_clause(&table, query.filters())?;
    let mut sql = format!(
        "SELECT {} {from}{where_sql} ORDER BY {table}.{id}",
        columns.join(", ")
    );
    if let Some(limit) = query.limit_value() {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok(Statement::new(sql, params))
}

/// `SELECT COUNT(*)` over the same rows [`select`] would return.
pub fn count(schema: &TableSchema, query: &EntityQuery) -> StoreResult<Statement> {
    let table = quote_identifier(&schema.table)?;
    let (from, _) = from_clause(schema, query.projection())?;
    let (where_sql, params) = where_clause(&table, query.filters())?;
    let inner = match query.limit_value() {
        Some(limit) => format!("SELECT 1 {from}{where_sql} LIMIT {limit}"),
        None => format!("SELECT 1 {from}{where_sql}"),
    };
    Ok(Statement::new(format!("SELECT COUNT(*) FROM ({inner})"), params))
}

/// `INSERT` of a full row, including its merge pointer.
pub fn insert(schema: &TableSchema, row: &EntityRow) -> StoreResult<Statement> {
    schema.check_row(row)?;
    let table = quote_identifier(&schema.table)?;

    let mut columns = vec![
        quote_identifier(PRIMARY_KEY_COLUMN)?,
        quote_identifier(MERGE_TARGET_COLUMN)?,
    ];
    for column in &schema.columns {
        columns.push(quote_identifier(column)?);
    }

    let mut params = Vec::with_capacity(columns.len());
    params.push(Value::Integer(row.id.get()));
    params.push(row.merge_target_id.map(EntityId::get).into());
    params.extend(row.values.iter().cloned());

    let placeholders = vec!["?"; columns.len()].join(", ");
    Ok(Statement::new(
        format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        ),
        params,
    ))
}

/// `UPDATE` of the attribute columns of one row. The merge pointer is not
/// part of the statement. Returns `None` when the table has no attributes.
pub fn update_attributes(schema: &TableSchema, row: &EntityRow) -> StoreResult<Option<Statement>> {
    let all: Vec<usize> = (0..schema.columns.len()).collect();
    update_columns(schema, row, &all)
}

/// `UPDATE` of the listed attribute columns (schema positions) of one row.
/// Returns `None` when `columns` is empty.
pub fn update_columns(
    schema: &TableSchema,
    row: &EntityRow,
    columns: &[usize],
) -> StoreResult<Option<Statement>> {
    schema.check_row(row)?;
    if columns.is_empty() {
        return Ok(None);
    }
    let table = quote_identifier(&schema.table)?;

    let mut assignments = Vec::with_capacity(columns.len());
    let mut params = Vec::with_capacity(columns.len() + 1);
    for &index in columns {
        let column = schema.columns.get(index).ok_or_else(|| {
            StoreError::Schema(format!("{} has no column #{index}", schema.table))
        })?;
        assignments.push(format!("{} = ?", quote_identifier(column)?));
        params.push(row.values[index].clone());
    }
    params.push(Value::Integer(row.id.get()));

    Ok(Some(Statement::new(
        format!(
            "UPDATE {table} SET {} WHERE {} = ?",
            assignments.join(", "),
            quote_identifier(PRIMARY_KEY_COLUMN)?
        ),
        params,
    )))
}

/// Conditional pointer write: only a row whose `merge_target_id` is still
/// null is updated.
pub fn claim_merge_target(
    schema: &TableSchema,
    source: EntityId,
    target: EntityId,
) -> StoreResult<Statement> {
    let table = quote_identifier(&schema.table)?;
    let fk = quote_identifier(MERGE_TARGET_COLUMN)?;
    let id = quote_identifier(PRIMARY_KEY_COLUMN)?;
    Ok(Statement::new(
        format!("UPDATE {table} SET {fk} = ? WHERE {id} = ? AND {fk} IS NULL"),
        vec![Value::Integer(target.get()), Value::Integer(source.get())],
    ))
}

/// `SELECT EXISTS` over rows pointing at `id`.
pub fn has_incoming(schema: &TableSchema, id: EntityId) -> StoreResult<Statement> {
    let table = quote_identifier(&schema.table)?;
    let fk = quote_identifier(MERGE_TARGET_COLUMN)?;
    Ok(Statement::new(
        format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {fk} = ?)"),
        vec![Value::Integer(id.get())],
    ))
}

/// Bulk move of child rows from one owner to another.
pub fn reassign_foreign_key(
    table: &str,
    foreign_key: &str,
    from: EntityId,
    to: EntityId,
) -> StoreResult<Statement> {
    let table = quote_identifier(table)?;
    let fk = quote_identifier(foreign_key)?;
    Ok(Statement::new(
        format!("UPDATE {table} SET {fk} = ? WHERE {fk} = ?"),
        vec![Value::Integer(to.get()), Value::Integer(from.get())],
    ))
}

/// DDL adding the nullable, self-referencing merge pointer column.
pub fn add_merge_column(schema: &TableSchema) -> StoreResult<String> {
    let table = quote_identifier(&schema.table)?;
    Ok(format!(
        "ALTER TABLE {table} ADD COLUMN {} INTEGER REFERENCES {table}({})",
        quote_identifier(MERGE_TARGET_COLUMN)?,
        quote_identifier(PRIMARY_KEY_COLUMN)?
    ))
}

/// DDL indexing the merge pointer column.
pub fn create_merge_index(schema: &TableSchema) -> StoreResult<String> {
    Ok(format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quote_identifier(&schema.merge_index_name())?,
        quote_identifier(&schema.table)?,
        quote_identifier(MERGE_TARGET_COLUMN)?
    ))
}

fn from_clause(schema: &TableSchema, projection: Projection) -> StoreResult<(String, String)> {
    let table = quote_identifier(&schema.table)?;
    match projection {
        Projection::Rows => Ok((format!("FROM {table}"), table)),
        Projection::Canonical => {
            let alias = quote_identifier(&schema.join_alias())?;
            let id = quote_identifier(PRIMARY_KEY_COLUMN)?;
            let fk = quote_identifier(MERGE_TARGET_COLUMN)?;
            Ok((
                format!(
                    "FROM {table} INNER JOIN {table} AS {alias} \
                     ON {alias}.{id} = COALESCE({table}.{fk}, {table}.{id})"
                ),
                alias,
            ))
        }
    }
}

fn where_clause(table: &str, filters: &[Filter]) -> StoreResult<(String, Vec<Value>)> {
    if filters.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut conditions = Vec::with_capacity(filters.len());
    let mut params = Vec::new();
    for filter in filters {
        let condition = match filter {
            Filter::Ids(ids) if ids.is_empty() => "1 = 0".to_string(),
            Filter::Ids(ids) => {
                params.extend(ids.iter().map(|id| Value::Integer(id.get())));
                format!(
                    "{table}.{} IN ({})",
                    quote_identifier(PRIMARY_KEY_COLUMN)?,
                    vec!["?"; ids.len()].join(", ")
                )
            }
            Filter::Eq { column, value } if value.is_null() => {
                format!("{table}.{} IS NULL", quote_identifier(column)?)
            }
            Filter::Eq { column, value } => {
                params.push(value.clone());
                format!("{table}.{} = ?", quote_identifier(column)?)
            }
            Filter::IsNull(column) => format!("{table}.{} IS NULL", quote_identifier(column)?),
            Filter::NotNull(column) => {
                format!("{table}.{} IS NOT NULL", quote_identifier(column)?)
            }
        };
        conditions.push(condition);
    }

    Ok((format!(" WHERE {}", conditions.join(" AND ")), params))
}
