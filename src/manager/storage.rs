//! transfers.json - discovered records and sync progress of one manager.

use crate::client::TransferRecord;
use crate::core::paths::TRANSFERS_FILE;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(super) struct TransferStore {
    #[serde(default)]
    pub(super) last_synced_height: u64,
    #[serde(default)]
    pub(super) records: Vec<TransferRecord>,
}

impl TransferStore {
    /// Empty store when nothing was saved yet.
    pub(super) fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(TRANSFERS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write through a temporary file so a crash never leaves a torn file.
    pub(super) fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(TRANSFERS_FILE);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Insert or replace by hash. `true` if anything changed.
    pub(super) fn upsert(&mut self, record: &TransferRecord) -> bool {
        match self.records.iter_mut().find(|r| r.hash == record.hash) {
            Some(existing) if existing == record => false,
            Some(existing) => {
                *existing = record.clone();
                true
            }
            None => {
                self.records.push(record.clone());
                true
            }
        }
    }

    pub(super) fn remove(&mut self, hash: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.hash != hash);
        self.records.len() != before
    }
}
