//! On-disk layout.
//!
//! ```text
//! <root>/                         $WALLETCORE_ROOT or <data dir>/walletcore
//!   └── <account uids>/
//!         └── <network uids>/
//!               └── <mode>/
//!                     └── transfers.json
//! ```

use crate::manager::WalletManagerMode;
use std::path::{Path, PathBuf};

/// Overrides the platform data directory.
pub const ROOT_ENV: &str = "WALLETCORE_ROOT";
pub const APP_DIR: &str = "walletcore";
pub const TRANSFERS_FILE: &str = "transfers.json";

pub fn default_storage_root() -> PathBuf {
    std::env::var(ROOT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR))
}

/// Directory of one network's manager data (all modes).
pub fn network_dir(root: &Path, account_uids: &str, network_uids: &str) -> PathBuf {
    root.join(account_uids).join(network_uids)
}

pub fn manager_dir(root: &Path, account_uids: &str, network_uids: &str, mode: WalletManagerMode) -> PathBuf {
    network_dir(root, account_uids, network_uids).join(mode.as_str())
}
