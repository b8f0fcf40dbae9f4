//! WalletManager - active object tracking one network for the account.
//!
//! # Architecture
//!
//! ```text
//! WalletManager
//!     │
//!     ├── Mutex<ManagerCore>        state, mode, wallets, epoch, I/O tasks
//!     │     └── every wallet/transfer mutation and event emission
//!     │         happens with this lock held
//!     │
//!     ├── I/O tasks (tokio)         connect, poll/subscribe, sync, submit
//!     │     └── post announcements ──→ System main handler
//!     │                                   └── handle_announcement (locks core)
//!     │
//!     └── transfers.json            discovered records + last synced height
//! ```
//!
//! # States
//!
//! ```text
//! Created → Disconnected ⇄ Connected → Syncing → Connected
//!    └──────────────↗  (connect from Created lands in Connected or Disconnected)
//! Deleted from any state
//! ```
//!
//! Public operations never await network I/O: `connect`, `disconnect`, `sync`
//! and `submit` return once the request is registered and report outcomes
//! through events. `disconnect` bumps the cancellation epoch under the lock;
//! announcements from older epochs are discarded, so nothing mutates after it
//! returns. Submissions still in flight at that point end in
//! `Failed("submission cancelled")`, never in `Signed`.

mod announce;
mod io;
mod signing;
mod storage;

pub(crate) use announce::Announcement;
pub(crate) use io::SyncSettings;

use crate::account::Account;
use crate::client::{BlockchainClient, FeeQuery};
use crate::core::paths;
use crate::currency::{Amount, Currency};
use crate::error::{Error, Result};
use crate::factory::{TransferFactory, WalletFactory};
use crate::network::{Address, FeeBasis, Network};
use crate::system::dispatch::Dispatcher;
use crate::system::listener::ListenerEvent;
use crate::transfer::{Transfer, TransferDirection, TransferEvent, TransferId, TransferParams, TransferState};
use crate::wallet::{FeeEstimateId, Wallet, WalletEvent, WalletId, WalletParams, WalletState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use storage::TransferStore;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SYNC_CANCELLED: &str = "sync cancelled";
const SUBMISSION_CANCELLED: &str = "submission cancelled";
const ESTIMATE_CANCELLED: &str = "estimate cancelled";

/// Process-unique wallet manager identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletManagerId(u64);

impl WalletManagerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 { self.0 }
}

impl fmt::Display for WalletManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "manager-{}", self.0) }
}

/// Synchronization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletManagerMode {
    /// Poll height and transfers every sync interval.
    ApiOnly,
    /// Initial query, then live heads and transfers from a subscription.
    P2pOnly,
    /// Live heads, with an API query on each new head.
    Hybrid,
}

impl WalletManagerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletManagerMode::ApiOnly => "api_only",
            WalletManagerMode::P2pOnly => "p2p_only",
            WalletManagerMode::Hybrid => "hybrid",
        }
    }

}

impl FromStr for WalletManagerMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "api_only" | "api" => Ok(WalletManagerMode::ApiOnly),
            "p2p_only" | "p2p" => Ok(WalletManagerMode::P2pOnly),
            "hybrid" => Ok(WalletManagerMode::Hybrid),
            _ => Err(Error::InvalidMode(value.into())),
        }
    }
}

impl fmt::Display for WalletManagerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletManagerState {
    Created,
    Disconnected,
    Connected,
    Syncing,
    Deleted,
}

impl WalletManagerState {
    pub fn is_active(&self) -> bool { matches!(self, WalletManagerState::Connected | WalletManagerState::Syncing) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalletManagerEvent {
    Created,
    Changed { old: WalletManagerState, new: WalletManagerState },
    WalletAdded { wallet: Wallet },
    WalletChanged { wallet: Wallet },
    WalletDeleted { wallet: Wallet },
    SyncStarted,
    SyncProgress { percent: f64 },
    SyncEnded { error: Option<String> },
    BlockHeightUpdated { height: u64 },
    Deleted,
}

/// Inputs handed to a `WalletManagerFactory`. Build the manager with
/// `WalletManager::create`.
pub struct WalletManagerParams {
    pub network: Network,
    pub account: Account,
    pub mode: WalletManagerMode,
    /// Storage root; the manager's data lives under
    /// `<root>/<account>/<network>/<mode>/`.
    pub storage_root: PathBuf,
    pub(crate) context: ManagerContext,
}

/// Engine plumbing handed through the manager factory.
#[derive(Clone)]
pub(crate) struct ManagerContext {
    pub(crate) client: Arc<dyn BlockchainClient>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) handle: Handle,
    pub(crate) settings: SyncSettings,
    pub(crate) address: Address,
    pub(crate) wallet_factory: Arc<dyn WalletFactory>,
    pub(crate) transfer_factory: Arc<dyn TransferFactory>,
}

#[derive(Clone)]
pub struct WalletManager {
    inner: Arc<ManagerInner>,
}

pub(crate) struct ManagerInner {
    id: WalletManagerId,
    network: Network,
    account: Account,
    storage_root: PathBuf,
    primary: Wallet,
    context: ManagerContext,
    height: AtomicU64,
    core: Mutex<ManagerCore>,
    sync_lock: Arc<tokio::sync::Mutex<()>>,
}

struct ManagerCore {
    state: WalletManagerState,
    mode: WalletManagerMode,
    wallets: Vec<Wallet>,
    epoch: u64,
    tasks: Vec<JoinHandle<()>>,
    /// Transfers handed to the network and awaiting its answer.
    submissions: Vec<(WalletId, TransferId)>,
    /// Fee estimates awaiting the network.
    estimates: Vec<(WalletId, FeeEstimateId)>,
    store: TransferStore,
}

fn wallet_params(network: &Network, currency: &Currency, manager: Weak<ManagerInner>) -> Result<WalletParams> {
    let unknown = || Error::UnknownCurrency { currency: currency.uids().into(), network: network.uids().into() };
    Ok(WalletParams {
        currency: currency.clone(),
        unit: network.default_unit(currency).ok_or_else(unknown)?,
        fee_unit: network.fee_unit(),
        default_fee_basis: network.default_fee_basis(currency).ok_or_else(unknown)?,
        manager,
    })
}

impl WalletManager {
    /// New manager in `Created` with its primary (native currency) wallet.
    pub fn create(params: WalletManagerParams) -> Result<Self> {
        let WalletManagerParams { network, account, mode, storage_root, context } = params;
        let currency = network.currency().clone();
        let template = wallet_params(&network, &currency, Weak::new())?;

        let inner = Arc::new_cyclic(|weak| {
            let primary = context.wallet_factory.create_wallet(WalletParams { manager: weak.clone(), ..template });
            ManagerInner {
                id: WalletManagerId::next(),
                network,
                account,
                storage_root,
                primary: primary.clone(),
                context,
                height: AtomicU64::new(0),
                core: Mutex::new(ManagerCore {
                    state: WalletManagerState::Created,
                    mode,
                    wallets: vec![primary],
                    epoch: 0,
                    tasks: Vec::new(),
                    submissions: Vec::new(),
                    estimates: Vec::new(),
                    store: TransferStore::default(),
                }),
                sync_lock: Arc::new(tokio::sync::Mutex::new(())),
            }
        });
        let manager = Self { inner };
        manager.check_wallet(&manager.inner.primary, &currency)?;
        Ok(manager)
    }

    pub(crate) fn from_inner(inner: Arc<ManagerInner>) -> Self { Self { inner } }

    fn lock(&self) -> MutexGuard<'_, ManagerCore> { self.inner.core.lock().unwrap_or_else(|p| p.into_inner()) }

    pub fn id(&self) -> WalletManagerId { self.inner.id }
    pub fn network(&self) -> &Network { &self.inner.network }
    pub fn account(&self) -> &Account { &self.inner.account }
    /// The account's address on this network.
    pub fn address(&self) -> &Address { &self.inner.context.address }
    pub fn mode(&self) -> WalletManagerMode { self.lock().mode }
    pub fn state(&self) -> WalletManagerState { self.lock().state }
    pub fn is_active(&self) -> bool { self.state().is_active() }
    pub fn height(&self) -> u64 { self.inner.height.load(Ordering::SeqCst) }

    /// Storage directory for the current mode.
    pub fn path(&self) -> PathBuf { self.dir(self.mode()) }

    fn dir(&self, mode: WalletManagerMode) -> PathBuf {
        paths::manager_dir(&self.inner.storage_root, self.inner.account.uids(), self.inner.network.uids(), mode)
    }

    pub fn wallets(&self) -> Vec<Wallet> { self.lock().wallets.clone() }
    pub fn primary_wallet(&self) -> Wallet { self.inner.primary.clone() }

    pub fn lookup_wallet(&self, id: WalletId) -> Option<Wallet> {
        self.lock().wallets.iter().find(|w| w.id() == id).cloned()
    }

    pub fn wallet_for_currency(&self, currency: &Currency) -> Option<Wallet> {
        self.lock().wallets.iter().find(|w| w.currency() == currency).cloned()
    }

    /// The wallet for `currency`, created if needed (one per currency).
    pub fn register_wallet(&self, currency: &Currency) -> Result<Wallet> {
        let mut core = self.lock();
        self.ensure_live(&core)?;
        self.register_wallet_locked(&mut core, currency)
    }

    /// Takes effect at the next `connect`.
    pub fn set_mode(&self, mode: WalletManagerMode) -> Result<()> {
        let mut core = self.lock();
        self.ensure_live(&core)?;
        if core.state.is_active() {
            return Err(Error::InvalidManagerState { operation: "set mode", state: core.state });
        }
        if !self.inner.network.supports_mode(mode) {
            return Err(Error::UnsupportedMode { network: self.inner.network.uids().into(), mode: mode.to_string() });
        }
        if core.mode != mode {
            info!(manager = %self.inner.id, old = %core.mode, new = %mode, "mode changed");
            core.mode = mode;
        }
        Ok(())
    }

    /// Begin network I/O. The outcome arrives as `Changed` to `Connected`, or
    /// to `Disconnected` on failure.
    pub fn connect(&self) -> Result<()> {
        let mut core = self.lock();
        if !matches!(core.state, WalletManagerState::Created | WalletManagerState::Disconnected) {
            return Err(Error::InvalidManagerState { operation: "connect", state: core.state });
        }
        core.tasks.retain(|t| !t.is_finished());
        if !core.tasks.is_empty() {
            debug!(manager = %self.inner.id, "connect already pending");
            return Ok(());
        }
        let ctx = self.io_context(&core);
        let begin = core.store.last_synced_height;
        info!(manager = %self.inner.id, network = %self.inner.network, mode = %core.mode, begin, "connecting");
        self.spawn_locked(&mut core, io::run(ctx, begin));
        Ok(())
    }

    /// Stop network I/O. No wallet or transfer changes after this returns.
    pub fn disconnect(&self) -> Result<()> {
        let mut core = self.lock();
        match core.state {
            WalletManagerState::Connected | WalletManagerState::Syncing => {}
            WalletManagerState::Created | WalletManagerState::Disconnected
                if core.tasks.iter().any(|t| !t.is_finished()) =>
            {
                self.quiesce_locked(&mut core);
                info!(manager = %self.inner.id, "connect cancelled");
                return Ok(());
            }
            state => return Err(Error::InvalidManagerState { operation: "disconnect", state }),
        }
        self.quiesce_locked(&mut core);
        if core.state == WalletManagerState::Syncing {
            self.emit(WalletManagerEvent::SyncEnded { error: Some(SYNC_CANCELLED.into()) });
        }
        self.set_state_locked(&mut core, WalletManagerState::Disconnected);
        info!(manager = %self.inner.id, "disconnected");
        Ok(())
    }

    /// Full rescan from the first block.
    pub fn sync(&self) -> Result<()> {
        let mut core = self.lock();
        if !core.state.is_active() {
            return Err(Error::InvalidManagerState { operation: "sync", state: core.state });
        }
        let ctx = self.io_context(&core);
        info!(manager = %self.inner.id, "full sync requested");
        self.spawn_locked(&mut core, io::rescan(ctx));
        Ok(())
    }

    /// Sign a `Created` transfer with the account key behind `phrase`.
    pub fn sign(&self, transfer: &Transfer, phrase: &str) -> Result<()> {
        let mut core = self.lock();
        self.sign_locked(&mut core, transfer, phrase).map(|_| ())
    }

    /// Hand a `Signed` transfer to the network. Acceptance moves it to
    /// `Submitted`, rejection to `Failed(reason)`.
    pub fn submit(&self, transfer: &Transfer) -> Result<()> {
        let mut core = self.lock();
        self.ensure_live(&core)?;
        if !core.state.is_active() {
            return Err(Error::InvalidManagerState { operation: "submit", state: core.state });
        }
        let wallet = self.owning_wallet(&core, transfer)?;
        self.submit_locked(&mut core, &wallet, transfer)
    }

    /// `sign` then `submit` under one lock; a signing failure changes nothing.
    pub fn sign_and_submit(&self, transfer: &Transfer, phrase: &str) -> Result<()> {
        let mut core = self.lock();
        if !core.state.is_active() {
            return Err(Error::InvalidManagerState { operation: "submit", state: core.state });
        }
        let wallet = self.sign_locked(&mut core, transfer, phrase)?;
        self.submit_locked(&mut core, &wallet, transfer)
    }

    /// Move `transfer` to `Deleted` and drop it from its wallet.
    pub fn remove_transfer(&self, transfer: &Transfer) -> Result<()> {
        let mut core = self.lock();
        self.ensure_live(&core)?;
        let wallet = self.owning_wallet(&core, transfer)?;
        self.transition_locked(&core, &wallet, transfer, TransferState::Deleted, "remove")?;
        wallet.remove_transfer(transfer);
        self.emit_transfer(&wallet, transfer, TransferEvent::Deleted);
        self.emit_wallet(&wallet, WalletEvent::TransferDeleted { transfer: transfer.clone() });
        if let Some(hash) = transfer.hash() {
            if core.store.remove(&hash) {
                self.persist_locked(&core);
            }
        }
        info!(manager = %self.inner.id, transfer = %transfer.id(), "transfer removed");
        Ok(())
    }

    pub(crate) fn create_outgoing_transfer(
        &self,
        wallet: &Wallet,
        target: &Address,
        amount: &Amount,
        fee_basis: &FeeBasis,
    ) -> Result<Transfer> {
        let core = self.lock();
        self.ensure_live(&core)?;
        let amount = self.check_outgoing(wallet, target, amount)?;
        if !fee_basis.unit().is_compatible(wallet.fee_unit()) {
            return Err(Error::IncompatibleUnit);
        }
        let source = self.inner.context.address.clone();
        let direction = if *target == source { TransferDirection::Recovered } else { TransferDirection::Sent };
        let transfer = self.create_transfer_locked(
            wallet,
            TransferParams {
                unit: wallet.unit().clone(),
                fee_unit: wallet.fee_unit().clone(),
                source: Some(source),
                target: Some(target.clone()),
                amount,
                direction,
                fee_basis: fee_basis.clone(),
                hash: None,
                wallet: wallet.downgrade(),
            },
        )?;
        info!(manager = %self.inner.id, transfer = %transfer.id(), target = %target, "transfer created");
        Ok(transfer)
    }

    pub(crate) fn request_fee_estimate(&self, wallet: &Wallet, target: &Address, amount: &Amount) -> Result<FeeEstimateId> {
        let mut core = self.lock();
        self.ensure_live(&core)?;
        let amount = self.check_outgoing(wallet, target, amount)?;
        if !core.state.is_active() {
            return Err(Error::InvalidManagerState { operation: "estimate fee", state: core.state });
        }
        let request = FeeEstimateId::next();
        let query = FeeQuery {
            currency: wallet.currency().uids().into(),
            source: self.inner.context.address.to_string(),
            target: target.to_string(),
            amount: amount.value(),
        };
        let ctx = self.io_context(&core);
        debug!(manager = %self.inner.id, %request, target = %target, "fee estimate requested");
        self.spawn_locked(&mut core, io::estimate(ctx, wallet.id(), request, query));
        core.estimates.push((wallet.id(), request));
        Ok(request)
    }

    pub(crate) fn update_default_fee_basis(&self, wallet: &Wallet, fee_basis: &FeeBasis) -> Result<()> {
        let core = self.lock();
        self.ensure_live(&core)?;
        self.ensure_owned(wallet)?;
        if !fee_basis.unit().is_compatible(wallet.fee_unit()) {
            return Err(Error::IncompatibleUnit);
        }
        wallet.replace_default_fee_basis(fee_basis.clone());
        self.emit_wallet(wallet, WalletEvent::FeeBasisUpdated { fee_basis: fee_basis.clone() });
        Ok(())
    }

    /// Creation events for the manager and its primary wallet.
    pub(crate) fn announce_created(&self) {
        let _core = self.lock();
        self.emit(WalletManagerEvent::Created);
        self.emit_wallet(&self.inner.primary, WalletEvent::Created);
        self.emit(WalletManagerEvent::WalletAdded { wallet: self.inner.primary.clone() });
    }

    /// Reload persisted transfers, emitting the same events discovery would.
    pub(crate) fn restore(&self) {
        let mut core = self.lock();
        let dir = self.dir(core.mode);
        let store = match TransferStore::load(&dir) {
            Ok(store) => store,
            Err(e) => {
                warn!(manager = %self.inner.id, path = %dir.display(), error = %e, "stored transfers unreadable; starting empty");
                return;
            }
        };
        let records = store.records.clone();
        self.inner.height.fetch_max(store.last_synced_height, Ordering::SeqCst);
        core.store = store;
        let mut restored = 0usize;
        for record in &records {
            match self.apply_record_locked(&mut core, record) {
                Ok(true) => restored += 1,
                Ok(false) => {}
                Err(e) => warn!(manager = %self.inner.id, hash = %record.hash, error = %e, "stored record skipped"),
            }
        }
        if restored > 0 {
            info!(manager = %self.inner.id, restored, "transfers restored");
        }
    }

    /// Stop I/O and retire the manager and its wallets.
    pub(crate) fn delete(&self) {
        let mut core = self.lock();
        if core.state == WalletManagerState::Deleted {
            return;
        }
        self.quiesce_locked(&mut core);
        if core.state == WalletManagerState::Syncing {
            self.emit(WalletManagerEvent::SyncEnded { error: Some(SYNC_CANCELLED.into()) });
        }
        for wallet in core.wallets.clone() {
            let old = wallet.set_state(WalletState::Deleted);
            if old != WalletState::Deleted {
                self.emit_wallet(&wallet, WalletEvent::Changed { old, new: WalletState::Deleted });
                self.emit_wallet(&wallet, WalletEvent::Deleted);
                self.emit(WalletManagerEvent::WalletDeleted { wallet });
            }
        }
        self.set_state_locked(&mut core, WalletManagerState::Deleted);
        self.emit(WalletManagerEvent::Deleted);
        info!(manager = %self.inner.id, network = %self.inner.network, "deleted");
    }

    // Everything below expects the core lock to be held by the caller.

    fn ensure_live(&self, core: &ManagerCore) -> Result<()> {
        if core.state == WalletManagerState::Deleted {
            return Err(Error::Deleted("wallet manager"));
        }
        Ok(())
    }

    fn ensure_owned(&self, wallet: &Wallet) -> Result<()> {
        if !wallet.belongs_to(&Arc::downgrade(&self.inner)) || wallet.state() == WalletState::Deleted {
            return Err(Error::Deleted("wallet"));
        }
        Ok(())
    }

    /// Common checks for sending `amount` to `target` from `wallet`; the
    /// amount in the wallet's unit.
    fn check_outgoing(&self, wallet: &Wallet, target: &Address, amount: &Amount) -> Result<Amount> {
        self.ensure_owned(wallet)?;
        let network = &self.inner.network;
        if !target.is_for(network) {
            return Err(Error::InvalidAddress { address: target.to_string(), network: network.uids().into() });
        }
        let amount = amount.convert(wallet.unit()).ok_or(Error::IncompatibleUnit)?;
        if amount.is_negative() || amount.is_zero() {
            return Err(Error::InvalidAmount(format!("{} is not positive", amount)));
        }
        Ok(amount)
    }

    fn owning_wallet(&self, core: &ManagerCore, transfer: &Transfer) -> Result<Wallet> {
        core.wallets.iter().find(|w| w.has_transfer(transfer)).cloned().ok_or(Error::Deleted("transfer"))
    }

    fn check_wallet(&self, wallet: &Wallet, currency: &Currency) -> Result<()> {
        let problem = if wallet.currency() != currency {
            Some("wrong currency")
        } else if !wallet.unit().has_currency(currency) {
            Some("unit of another currency")
        } else if !wallet.fee_unit().is_compatible(&self.inner.network.fee_unit()) {
            Some("fee unit incompatible with the network")
        } else if !wallet.belongs_to(&Arc::downgrade(&self.inner)) {
            Some("wallet not linked to its manager")
        } else if wallet.state() != WalletState::Created || !wallet.transfers().is_empty() {
            Some("wallet not fresh")
        } else {
            None
        };
        match problem {
            Some(problem) => Err(Error::Factory(format!("{} wallet: {}", currency.code(), problem))),
            None => Ok(()),
        }
    }

    fn register_wallet_locked(&self, core: &mut ManagerCore, currency: &Currency) -> Result<Wallet> {
        if let Some(wallet) = core.wallets.iter().find(|w| w.currency() == currency) {
            return Ok(wallet.clone());
        }
        let params = wallet_params(&self.inner.network, currency, Arc::downgrade(&self.inner))?;
        let wallet = self.inner.context.wallet_factory.create_wallet(params);
        self.check_wallet(&wallet, currency)?;
        core.wallets.push(wallet.clone());
        self.emit_wallet(&wallet, WalletEvent::Created);
        self.emit(WalletManagerEvent::WalletAdded { wallet: wallet.clone() });
        info!(manager = %self.inner.id, currency = %currency, "wallet registered");
        Ok(wallet)
    }

    fn create_transfer_locked(&self, wallet: &Wallet, params: TransferParams) -> Result<Transfer> {
        let amount = params.amount.clone();
        let transfer = self.inner.context.transfer_factory.create_transfer(params);
        let problem = if transfer.state() != TransferState::Created {
            Some("transfer not created in Created")
        } else if !transfer.belongs_to(&wallet.downgrade()) {
            Some("transfer not linked to its wallet")
        } else if !transfer.unit().is_compatible(wallet.unit()) || *transfer.amount() != amount {
            Some("amount altered")
        } else if wallet.has_transfer(&transfer) {
            Some("transfer reused")
        } else {
            None
        };
        if let Some(problem) = problem {
            return Err(Error::Factory(problem.into()));
        }
        wallet.push_transfer(transfer.clone());
        self.emit_transfer(wallet, &transfer, TransferEvent::Created);
        self.emit_wallet(wallet, WalletEvent::TransferAdded { transfer: transfer.clone() });
        Ok(transfer)
    }

    fn transition_locked(
        &self,
        core: &ManagerCore,
        wallet: &Wallet,
        transfer: &Transfer,
        next: TransferState,
        operation: &'static str,
    ) -> Result<()> {
        let old = transfer.set_state(next.clone(), operation)?;
        debug!(transfer = %transfer.id(), old = ?old.kind(), new = ?next.kind(), "transfer state changed");
        self.emit_transfer(wallet, transfer, TransferEvent::Changed { old, new: next });
        self.emit_wallet(wallet, WalletEvent::TransferChanged { transfer: transfer.clone() });
        self.refresh_balance_locked(core, wallet);
        if *wallet != self.inner.primary {
            // Token fees are paid in the native currency
            self.refresh_balance_locked(core, &self.inner.primary);
        }
        Ok(())
    }

    fn refresh_balance_locked(&self, core: &ManagerCore, wallet: &Wallet) {
        let fee_payers: Vec<Transfer> = core.wallets.iter().filter(|w| *w != wallet).flat_map(Wallet::transfers).collect();
        if let Some(amount) = wallet.refresh_balance(&fee_payers) {
            self.emit_wallet(wallet, WalletEvent::BalanceUpdated { amount });
        }
    }

    fn sign_locked(&self, core: &mut ManagerCore, transfer: &Transfer, phrase: &str) -> Result<Wallet> {
        self.ensure_live(core)?;
        let wallet = self.owning_wallet(core, transfer)?;
        let state = transfer.state();
        if state != TransferState::Created {
            return Err(Error::InvalidTransferState { operation: "sign", state: state.kind() });
        }
        let network = &self.inner.network;
        let payload = signing::payload(network, &wallet, transfer)?;
        let signature = self.inner.account.sign(phrase, network, signing::digest(&payload))?;
        let hash = signing::transaction_hash(network, &payload, &signature);
        transfer.set_signature(signature, hash);
        self.transition_locked(core, &wallet, transfer, TransferState::Signed, "sign")?;
        info!(manager = %self.inner.id, transfer = %transfer.id(), "transfer signed");
        Ok(wallet)
    }

    fn submit_locked(&self, core: &mut ManagerCore, wallet: &Wallet, transfer: &Transfer) -> Result<()> {
        let state = transfer.state();
        if state != TransferState::Signed {
            return Err(Error::InvalidTransferState { operation: "submit", state: state.kind() });
        }
        let signed = signing::signed_transfer(&self.inner.network, wallet, transfer)?;
        let ctx = self.io_context(core);
        info!(manager = %self.inner.id, transfer = %transfer.id(), hash = %signed.hash, "submitting");
        self.spawn_locked(core, io::submit(ctx, wallet.id(), transfer.id(), signed));
        core.submissions.push((wallet.id(), transfer.id()));
        Ok(())
    }

    fn set_state_locked(&self, core: &mut ManagerCore, state: WalletManagerState) {
        if core.state == state {
            return;
        }
        let old = std::mem::replace(&mut core.state, state);
        debug!(manager = %self.inner.id, ?old, new = ?state, "state changed");
        self.emit(WalletManagerEvent::Changed { old, new: state });
    }

    fn update_height_locked(&self, height: u64) {
        let old = self.inner.height.fetch_max(height, Ordering::SeqCst);
        if height > old {
            self.emit(WalletManagerEvent::BlockHeightUpdated { height });
        }
    }

    /// Cancel every in-flight I/O task and orphan their announcements.
    /// Unanswered submissions fail and unanswered estimates are refused here.
    fn quiesce_locked(&self, core: &mut ManagerCore) {
        core.epoch += 1;
        for task in core.tasks.drain(..) {
            task.abort();
        }
        for (wallet, transfer) in std::mem::take(&mut core.submissions) {
            let Some(wallet) = core.wallets.iter().find(|w| w.id() == wallet).cloned() else { continue };
            let Some(transfer) = wallet.lookup_transfer(transfer) else { continue };
            let failed = TransferState::Failed(SUBMISSION_CANCELLED.into());
            match self.transition_locked(core, &wallet, &transfer, failed, "submit") {
                Ok(()) => {
                    warn!(manager = %self.inner.id, transfer = %transfer.id(), "submission cancelled");
                    self.emit_wallet(&wallet, WalletEvent::TransferSubmitted { transfer, success: false });
                }
                Err(e) => debug!(manager = %self.inner.id, error = %e, "cancelled submission already settled"),
            }
        }
        for (wallet, request) in std::mem::take(&mut core.estimates) {
            if let Some(wallet) = core.wallets.iter().find(|w| w.id() == wallet) {
                let result = Err(ESTIMATE_CANCELLED.to_string());
                self.emit_wallet(wallet, WalletEvent::FeeBasisEstimated { request, result });
            }
        }
    }

    fn spawn_locked<F>(&self, core: &mut ManagerCore, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        core.tasks.retain(|t| !t.is_finished());
        core.tasks.push(self.inner.context.handle.spawn(future));
    }

    fn io_context(&self, core: &ManagerCore) -> io::IoContext {
        io::IoContext {
            manager: self.inner.id,
            epoch: core.epoch,
            network: self.inner.network.clone(),
            mode: core.mode,
            addresses: vec![self.inner.context.address.to_string()],
            client: self.inner.context.client.clone(),
            dispatcher: self.inner.context.dispatcher.clone(),
            settings: self.inner.context.settings,
            sync_lock: self.inner.sync_lock.clone(),
        }
    }

    fn persist_locked(&self, core: &ManagerCore) {
        let dir = self.dir(core.mode);
        if let Err(e) = core.store.save(&dir) {
            warn!(manager = %self.inner.id, path = %dir.display(), error = %e, "failed to persist transfers");
        }
    }

    fn emit(&self, event: WalletManagerEvent) {
        self.inner.context.dispatcher.emit(ListenerEvent::Manager(self.clone(), event));
    }

    fn emit_wallet(&self, wallet: &Wallet, event: WalletEvent) {
        self.inner.context.dispatcher.emit(ListenerEvent::Wallet(self.clone(), wallet.clone(), event));
    }

    fn emit_transfer(&self, wallet: &Wallet, transfer: &Transfer, event: TransferEvent) {
        self.inner.context.dispatcher.emit(ListenerEvent::Transfer(self.clone(), wallet.clone(), transfer.clone(), event));
    }
}

impl PartialEq for WalletManager {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }
}
impl Eq for WalletManager {}

impl fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletManager")
            .field("id", &self.inner.id)
            .field("network", &self.inner.network.uids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_its_name() {
        for mode in [WalletManagerMode::ApiOnly, WalletManagerMode::P2pOnly, WalletManagerMode::Hybrid] {
            assert_eq!(mode.to_string().parse::<WalletManagerMode>().unwrap(), mode);
        }
        assert_eq!(" P2P ".parse::<WalletManagerMode>().unwrap(), WalletManagerMode::P2pOnly);
        assert!(matches!("lightning".parse::<WalletManagerMode>(), Err(Error::InvalidMode(_))));
    }

    #[test]
    fn only_connected_states_are_active() {
        assert!(WalletManagerState::Connected.is_active());
        assert!(WalletManagerState::Syncing.is_active());
        assert!(!WalletManagerState::Created.is_active());
        assert!(!WalletManagerState::Disconnected.is_active());
        assert!(!WalletManagerState::Deleted.is_active());
    }
}
