use serde::{Deserialize, Serialize};

/// Tuning for merge graph reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Longest chain [`resolve_target`](crate::MergeGraph::resolve_target)
    /// will follow before reporting an integrity error. Chains built by
    /// pairwise merges are rarely deeper than two.
    pub max_resolution_hops: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_resolution_hops: 64,
        }
    }
}
