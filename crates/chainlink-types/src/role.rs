use std::fmt;

use serde::{Deserialize, Serialize};

/// The side a record plays in a pairwise merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRole {
    /// The record being folded away.
    #[default]
    Source,
    /// The surviving, canonical record.
    Target,
}

impl MergeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
        }
    }
}

impl fmt::Display for MergeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_role_is_source() {
        assert_eq!(MergeRole::default(), MergeRole::Source);
        assert_eq!(MergeRole::Target.to_string(), "target");
    }
}
