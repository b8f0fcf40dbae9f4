//! walletcore: wallet-manager synchronization and event dispatch.
//!
//! # Architecture
//!
//! ```text
//! System (one per process)
//!   │
//!   ├── Networks (static catalog: bitcoin, bitcoincash, ethereum)
//!   │
//!   ├── WalletManager (one per activated network)
//!   │     ├── Wallet (primary eagerly, tokens on demand)
//!   │     │     └── Transfer (Created → Signed → Submitted → Pending → Included | Failed)
//!   │     ├── I/O tasks ──→ BlockchainClient
//!   │     └── transfers.json
//!   │
//!   └── Dispatch
//!         ├── main handler (tokio task): applies I/O announcements
//!         └── walletcore-listener (thread): calls SystemListener in order
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use walletcore::{Account, System, SystemConfig, WalletManagerMode};
//!
//! let account = Account::create_from_phrase(&phrase, chrono::Utc::now())?;
//! let system = System::create(SystemConfig::new(), account, client, &listener)?;
//!
//! let network = system.lookup_network("bitcoin-mainnet").unwrap();
//! let manager = system.create_wallet_manager(&network, WalletManagerMode::ApiOnly)?;
//! manager.connect()?;
//!
//! let wallet = manager.primary_wallet();
//! let transfer = wallet.create_transfer(&target, &amount, &wallet.default_fee_basis())?;
//! manager.sign_and_submit(&transfer, &phrase)?;
//! ```

pub mod account;
pub mod client;
pub mod config;
pub mod core;
pub mod currency;
pub mod error;
pub mod factory;
pub mod logging;
pub mod manager;
pub mod network;
pub mod runtime;
pub mod system;
pub mod transfer;
pub mod wallet;

pub use account::Account;
pub use client::{BlockchainClient, ChainUpdate, FeeQuery, SignedTransfer, TransferRecord};
pub use config::SystemConfig;
pub use currency::{Amount, Currency, CurrencyPair, Unit};
pub use error::{Error, Result};
pub use factory::{
    DefaultTransferFactory, DefaultWalletFactory, DefaultWalletManagerFactory, Factories, TransferFactory,
    WalletFactory, WalletManagerFactory,
};
pub use logging::init_logging;
pub use manager::{
    WalletManager, WalletManagerEvent, WalletManagerId, WalletManagerMode, WalletManagerParams, WalletManagerState,
};
pub use network::{Address, FeeBasis, Network, NetworkFee, NetworkType};
pub use runtime::Shutdown;
pub use system::{NetworkEvent, System, SystemListener};
pub use transfer::{
    Transfer, TransferConfirmation, TransferDirection, TransferEvent, TransferId, TransferParams, TransferState,
    TransferStateKind,
};
pub use wallet::{FeeEstimateId, Wallet, WalletEvent, WalletId, WalletParams, WalletState};
