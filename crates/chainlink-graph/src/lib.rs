//! Merge graph model for chainlink.
//!
//! Rows of a mergeable table form a forest: each row either is canonical
//! (`merge_target_id` null) or points at the row it was folded into. This
//! crate owns the rules over that forest and never mutates it:
//!
//! - legality predicates ([`MergeGraph::is_mergeable_as_source`],
//!   [`MergeGraph::is_mergeable_as_target`])
//! - recursive resolution ([`MergeGraph::resolve_target`]) guarded against
//!   corrupted cycles
//! - one-hop bulk resolution ([`MergeGraph::as_canonical`]) via a self-join
//! - the [`targets`](MergeGraph::targets) / [`sources`](MergeGraph::sources)
//!   partition
//!
//! Writing merge pointers is the job of `chainlink-merge`.

pub mod config;
pub mod entity;
pub mod error;
pub mod graph;
mod resolve;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::GraphConfig;
pub use entity::{Entity, Table};
pub use error::{GraphError, GraphResult, IntegrityError};
pub use graph::MergeGraph;
