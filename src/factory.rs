//! Factories - caller hooks for building managers, wallets and transfers.
//!
//! The engine asks a factory for every entity it creates, then checks the
//! result against the parameters it passed; a factory that breaks an invariant
//! makes the surrounding operation fail with `Error::Factory`.
//!
//! Wallet and transfer factories run while the owning manager is locked: they
//! must not call back into the manager or its wallets.

use crate::error::Result;
use crate::manager::{WalletManager, WalletManagerParams};
use crate::transfer::{Transfer, TransferParams};
use crate::wallet::{Wallet, WalletParams};
use std::sync::Arc;

pub trait WalletManagerFactory: Send + Sync {
    fn create_manager(&self, params: WalletManagerParams) -> Result<WalletManager>;
}

pub trait WalletFactory: Send + Sync {
    fn create_wallet(&self, params: WalletParams) -> Wallet;
}

pub trait TransferFactory: Send + Sync {
    fn create_transfer(&self, params: TransferParams) -> Transfer;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWalletManagerFactory;

impl WalletManagerFactory for DefaultWalletManagerFactory {
    fn create_manager(&self, params: WalletManagerParams) -> Result<WalletManager> { WalletManager::create(params) }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWalletFactory;

impl WalletFactory for DefaultWalletFactory {
    fn create_wallet(&self, params: WalletParams) -> Wallet { Wallet::create(params) }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTransferFactory;

impl TransferFactory for DefaultTransferFactory {
    fn create_transfer(&self, params: TransferParams) -> Transfer { Transfer::create(params) }
}

/// The three factories a `System` uses.
#[derive(Clone)]
pub struct Factories {
    pub manager: Arc<dyn WalletManagerFactory>,
    pub wallet: Arc<dyn WalletFactory>,
    pub transfer: Arc<dyn TransferFactory>,
}

impl Default for Factories {
    fn default() -> Self {
        Self {
            manager: Arc::new(DefaultWalletManagerFactory),
            wallet: Arc::new(DefaultWalletFactory),
            transfer: Arc::new(DefaultTransferFactory),
        }
    }
}

impl Factories {
    pub fn with_manager(mut self, factory: impl WalletManagerFactory + 'static) -> Self {
        self.manager = Arc::new(factory);
        self
    }

    pub fn with_wallet(mut self, factory: impl WalletFactory + 'static) -> Self {
        self.wallet = Arc::new(factory);
        self
    }

    pub fn with_transfer(mut self, factory: impl TransferFactory + 'static) -> Self {
        self.transfer = Arc::new(factory);
        self
    }
}
