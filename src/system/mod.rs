//! System - process-wide owner of networks, wallet managers and dispatch.
//!
//! At most one System is alive per process. It builds the network catalog,
//! owns one wallet manager per activated network and runs the two dispatch
//! stages (see `dispatch`). Dropping it tears everything down: managers are
//! disconnected and deleted with their events, the main handler stops and
//! the listener thread exits after draining its queue.

pub(crate) mod dispatch;
pub(crate) mod listener;

pub use listener::{NetworkEvent, SystemListener};

use crate::account::Account;
use crate::client::BlockchainClient;
use crate::config::SystemConfig;
use crate::error::{Error, Result};
use crate::factory::Factories;
use crate::manager::{ManagerContext, SyncSettings, WalletManager, WalletManagerId, WalletManagerMode, WalletManagerParams, WalletManagerState};
use crate::network::Network;
use crate::runtime::Shutdown;
use crate::transfer::{Transfer, TransferId};
use crate::wallet::{Wallet, WalletId};
use dispatch::Dispatcher;
use listener::ListenerEvent;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{info, warn};

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// The engine. Not `Clone`: dropping it shuts everything down.
pub struct System {
    inner: Arc<SystemInner>,
}

pub(crate) struct SystemInner {
    config: SystemConfig,
    account: Account,
    storage_root: PathBuf,
    client: Arc<dyn BlockchainClient>,
    factories: Factories,
    networks: Vec<Network>,
    managers: RwLock<Vec<WalletManager>>,
    dispatcher: Dispatcher,
    shutdown: Shutdown,
    handle: Handle,
}

impl System {
    /// Start the engine. Must be called inside a tokio runtime.
    pub fn create<L: SystemListener + 'static>(
        config: SystemConfig,
        account: Account,
        client: Arc<dyn BlockchainClient>,
        listener: &Arc<L>,
    ) -> Result<Self> {
        Self::create_with_factories(config, account, client, listener, Factories::default())
    }

    pub fn create_with_factories<L: SystemListener + 'static>(
        config: SystemConfig,
        account: Account,
        client: Arc<dyn BlockchainClient>,
        listener: &Arc<L>,
        factories: Factories,
    ) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        if ACTIVE.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(Error::SystemAlreadyActive);
        }

        let (dispatcher, main_rx, listener_rx) = Dispatcher::new();
        let weak_listener: Weak<L> = Arc::downgrade(listener);
        let weak_listener: Weak<dyn SystemListener> = weak_listener;
        if let Err(e) = dispatch::spawn_listener_thread(weak_listener, listener_rx) {
            ACTIVE.store(false, Ordering::SeqCst);
            return Err(Error::Io(e));
        }

        let storage_root = config.storage_root();
        let networks = Network::catalog(config.mainnet);
        let shutdown = Shutdown::new();
        let inner = Arc::new(SystemInner {
            config,
            account,
            storage_root,
            client,
            factories,
            networks,
            managers: RwLock::new(Vec::new()),
            dispatcher: dispatcher.clone(),
            shutdown: shutdown.clone(),
            handle: handle.clone(),
        });
        dispatch::spawn_main_handler(&handle, Arc::downgrade(&inner), dispatcher, main_rx, shutdown.subscribe());

        for network in &inner.networks {
            inner.dispatcher.emit(ListenerEvent::Network(network.clone(), NetworkEvent::Created));
        }
        info!(
            account = %inner.account.uids(),
            mainnet = inner.config.mainnet,
            url = %inner.config.blockchain_url,
            networks = inner.networks.len(),
            root = %inner.storage_root.display(),
            "system started"
        );
        Ok(Self { inner })
    }

    pub fn config(&self) -> &SystemConfig { &self.inner.config }
    pub fn account(&self) -> &Account { &self.inner.account }
    pub fn storage_root(&self) -> &PathBuf { &self.inner.storage_root }
    pub fn networks(&self) -> Vec<Network> { self.inner.networks.clone() }
    pub fn managers(&self) -> Vec<WalletManager> { self.inner.read_managers().clone() }

    pub fn lookup_network(&self, uids: &str) -> Option<Network> {
        self.inner.networks.iter().find(|n| n.uids() == uids).cloned()
    }

    pub fn lookup_manager(&self, id: WalletManagerId) -> Option<WalletManager> { self.inner.manager(id) }

    pub fn manager_for_network(&self, network: &Network) -> Option<WalletManager> {
        self.inner.read_managers().iter().find(|m| m.network() == network).cloned()
    }

    /// `id` among the wallets of `manager`, which must belong to this System.
    pub fn lookup_wallet(&self, manager: &WalletManager, id: WalletId) -> Option<Wallet> {
        self.owns(manager).then(|| manager.lookup_wallet(id)).flatten()
    }

    pub fn lookup_transfer(&self, wallet: &Wallet, id: TransferId) -> Option<Transfer> {
        let manager = wallet.manager()?;
        self.owns(&manager).then(|| wallet.lookup_transfer(id)).flatten()
    }

    fn owns(&self, manager: &WalletManager) -> bool { self.inner.read_managers().contains(manager) }

    /// Activate `network` in `mode`. One manager per network. Persisted
    /// transfers are restored before this returns.
    pub fn create_wallet_manager(&self, network: &Network, mode: WalletManagerMode) -> Result<WalletManager> {
        let inner = &self.inner;
        if !inner.networks.contains(network) {
            return Err(Error::UnknownNetwork(network.uids().into()));
        }
        if !network.supports_mode(mode) {
            return Err(Error::UnsupportedMode { network: network.uids().into(), mode: mode.to_string() });
        }
        if self.manager_for_network(network).is_some() {
            return Err(Error::ManagerExists(network.uids().into()));
        }

        let params = WalletManagerParams {
            network: network.clone(),
            account: inner.account.clone(),
            mode,
            storage_root: inner.storage_root.clone(),
            context: ManagerContext {
                client: inner.client.clone(),
                dispatcher: inner.dispatcher.clone(),
                handle: inner.handle.clone(),
                settings: SyncSettings::from_config(&inner.config),
                address: inner.account.address(network)?,
                wallet_factory: inner.factories.wallet.clone(),
                transfer_factory: inner.factories.transfer.clone(),
            },
        };
        let manager = inner.factories.manager.create_manager(params)?;
        if manager.network() != network
            || manager.mode() != mode
            || manager.state() != WalletManagerState::Created
            || manager.account() != &inner.account
        {
            return Err(Error::Factory(format!("manager for {} does not match its parameters", network.uids())));
        }

        {
            let mut managers = inner.write_managers();
            if managers.iter().any(|m| m.network() == network) {
                return Err(Error::ManagerExists(network.uids().into()));
            }
            managers.push(manager.clone());
        }
        manager.announce_created();
        manager.restore();
        info!(manager = %manager.id(), network = %network, mode = %mode, path = %manager.path().display(), "wallet manager created");
        Ok(manager)
    }

    /// Disconnect and delete `manager`.
    pub fn remove_wallet_manager(&self, manager: &WalletManager) -> Result<()> {
        {
            let mut managers = self.inner.write_managers();
            let before = managers.len();
            managers.retain(|m| m != manager);
            if managers.len() == before {
                return Err(Error::Deleted("wallet manager"));
            }
        }
        manager.delete();
        Ok(())
    }

    /// Resolves once every announcement posted so far has been applied and
    /// every resulting event delivered.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.inner.dispatcher.announce(crate::manager::Announcement::Flush(done));
        if wait.await.is_err() {
            warn!("flush interrupted by shutdown");
        }
    }
}

impl SystemInner {
    fn read_managers(&self) -> RwLockReadGuard<'_, Vec<WalletManager>> {
        self.managers.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_managers(&self) -> RwLockWriteGuard<'_, Vec<WalletManager>> {
        self.managers.write().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn manager(&self, id: WalletManagerId) -> Option<WalletManager> {
        self.read_managers().iter().find(|m| m.id() == id).cloned()
    }
}

impl Drop for SystemInner {
    fn drop(&mut self) {
        let managers = std::mem::take(&mut *self.write_managers());
        for manager in &managers {
            manager.delete();
        }
        self.shutdown.trigger();
        self.dispatcher.stop_listener();
        ACTIVE.store(false, Ordering::SeqCst);
        info!(managers = managers.len(), "system stopped");
    }
}
