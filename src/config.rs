//! System configuration - passed in by the embedding application

use crate::core::paths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration. Deserializes from partial JSON, missing fields
/// taking their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// `None` resolves through `paths::default_storage_root`.
    pub storage_root: Option<PathBuf>,
    pub blockchain_url: String,
    /// Selects mainnet or testnet networks from the catalog.
    pub mainnet: bool,
    /// API-mode polling period.
    pub sync_interval_ms: u64,
    /// Blocks per `get_transfers` request during a sync pass.
    pub sync_chunk_blocks: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            storage_root: None,
            blockchain_url: "https://api.blockset.com".into(),
            mainnet: true,
            sync_interval_ms: 10_000,
            sync_chunk_blocks: 5_000,
        }
    }
}

impl SystemConfig {
    pub fn new() -> Self { Self::default() }
    pub fn with_storage_root(mut self, path: impl Into<PathBuf>) -> Self { self.storage_root = Some(path.into()); self }
    pub fn with_blockchain_url(mut self, url: impl Into<String>) -> Self { self.blockchain_url = url.into(); self }
    pub fn with_mainnet(mut self, mainnet: bool) -> Self { self.mainnet = mainnet; self }
    pub fn with_sync_interval(mut self, interval: Duration) -> Self { self.sync_interval_ms = interval.as_millis() as u64; self }
    pub fn with_sync_chunk_blocks(mut self, blocks: u64) -> Self { self.sync_chunk_blocks = blocks; self }

    pub fn storage_root(&self) -> PathBuf {
        self.storage_root.clone().unwrap_or_else(paths::default_storage_root)
    }

    pub fn sync_interval(&self) -> Duration { Duration::from_millis(self.sync_interval_ms.max(1)) }

    pub fn sync_chunk_blocks(&self) -> u64 { self.sync_chunk_blocks.max(1) }
}
