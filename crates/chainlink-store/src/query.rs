//! Filter queries over a mergeable table.
//!
//! An [`EntityQuery`] is a conjunction of [`Filter`]s plus a [`Projection`].
//! Filters always apply to the queried rows themselves; the projection
//! decides whether those rows or their one-hop merge targets come back.

use chainlink_types::{EntityId, Value};

/// One condition of a query. Conditions are ANDed together.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// `id IN (...)`. An empty list matches nothing.
    Ids(Vec<EntityId>),
    /// `column = value`, or `column IS NULL` when `value` is null.
    Eq { column: String, value: Value },
    IsNull(String),
    NotNull(String),
}

/// What a query returns for each matching row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Projection {
    /// The matching rows.
    #[default]
    Rows,
    /// The row each match points at through `merge_target_id`, or the match
    /// itself when it is canonical. One hop only: a match whose target is
    /// itself merged yields that intermediate target.
    Canonical,
}

/// A filtered query over one mergeable table, ordered by the queried rows' id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityQuery {
    filters: Vec<Filter>,
    projection: Projection,
    limit: Option<usize>,
}

impl EntityQuery {
    /// All rows of the table.
    pub fn all() -> Self {
        Self::default()
    }

    /// Rows with the given ids.
    pub fn ids(ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self::all().where_ids(ids)
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn where_ids(self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.filter(Filter::Ids(ids.into_iter().collect()))
    }

    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq {
            column: column.into(),
            value: value.into(),
        })
    }

    pub fn where_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::IsNull(column.into()))
    }

    pub fn where_not_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::NotNull(column.into()))
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Same filters, projected onto one-hop merge targets.
    pub fn canonical(mut self) -> Self {
        self.projection = Projection::Canonical;
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }
}
