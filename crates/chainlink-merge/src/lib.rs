//! Merge engine for chainlink.
//!
//! Folds a duplicate record (the source) into a canonical one (the target)
//! by pointing the source's `merge_target_id` at the target, optionally
//! moving dependent child rows over first. Each merge is one storage
//! transaction and is legal only when the source is canonical with nothing
//! merged into it and the target is canonical.
//!
//! ```text
//! before            after merge(T, S)
//!   T    S            T <- S
//! ```

pub mod association;
pub mod engine;
pub mod error;

#[cfg(test)]
pub(crate) mod fixtures;

pub use association::{Association, AssociationKind, Reassignment};
pub use engine::{MergeEngine, MergeOutcome};
pub use error::{DirectionViolation, MergeError, MergeResult};
