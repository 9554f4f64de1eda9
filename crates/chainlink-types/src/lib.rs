//! Foundation types for chainlink merge chains.
//!
//! Every other chainlink crate depends on `chainlink-types`.
//!
//! # Key Types
//!
//! - [`EntityId`]: Stable primary key of a mergeable row
//! - [`Value`]: A single column value as stored in the relational store
//! - [`MergeRole`]: The side of a pairwise merge (source or target)
//! - [`validate_identifier`]: SQL identifier validation for table and column names

pub mod error;
pub mod id;
pub mod names;
pub mod role;
pub mod value;

pub use error::TypeError;
pub use id::EntityId;
pub use names::{validate_identifier, MERGE_TARGET_COLUMN, MERGE_TARGET_JOIN_PREFIX, PRIMARY_KEY_COLUMN};
pub use role::MergeRole;
pub use value::Value;
