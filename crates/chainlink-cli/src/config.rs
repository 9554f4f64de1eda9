use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use chainlink_graph::GraphConfig;
use chainlink_store::StoreConfig;

/// Settings read from `--config`.
///
/// ```toml
/// [store]
/// busy_timeout_ms = 10000
/// journal_mode = "wal"
///
/// [graph]
/// max_resolution_hops = 16
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainlinkConfig {
    pub store: StoreConfig,
    pub graph: GraphConfig,
}

impl ChainlinkConfig {
    /// Load from `path`, or use defaults when no file was given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
