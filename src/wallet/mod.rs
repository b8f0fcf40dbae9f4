//! Wallet - the transfers of one currency under a wallet manager.
//!
//! # Balance
//!
//! The balance is derived, never stored independently: it is recomputed
//! after every transfer mutation from the transfers currently in
//! `Submitted`, `Pending` or `Included`.
//!
//! | Direction | Contribution |
//! |-----------|--------------|
//! | received  | `+amount` |
//! | sent      | `-amount - fee` |
//! | recovered | `-fee` |
//!
//! The fee is the confirmed fee once included, the fee-basis estimate before,
//! and only counts when it is denominated in the wallet's currency. Token
//! transfers pay their fee from the native wallet, so the native balance
//! also carries the fees of sent and recovered transfers in sibling wallets.

mod balance;

use crate::currency::{Amount, Currency, Unit};
use crate::error::{Error, Result};
use crate::manager::{ManagerInner, WalletManager};
use crate::network::{Address, FeeBasis};
use crate::transfer::{Transfer, TransferId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Process-unique wallet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletId(u64);

impl WalletId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 { self.0 }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "wallet-{}", self.0) }
}

/// Ticket for an asynchronous fee estimate, echoed in
/// `WalletEvent::FeeBasisEstimated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeeEstimateId(u64);

impl FeeEstimateId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 { self.0 }
}

impl fmt::Display for FeeEstimateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "estimate-{}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletState {
    Created,
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    Created,
    Changed { old: WalletState, new: WalletState },
    TransferAdded { transfer: Transfer },
    TransferChanged { transfer: Transfer },
    TransferSubmitted { transfer: Transfer, success: bool },
    TransferDeleted { transfer: Transfer },
    BalanceUpdated { amount: Amount },
    FeeBasisUpdated { fee_basis: FeeBasis },
    /// Answer to `Wallet::estimate_fee_basis`.
    FeeBasisEstimated { request: FeeEstimateId, result: std::result::Result<FeeBasis, String> },
    Deleted,
}

/// Inputs handed to a `WalletFactory`. Build the wallet with `Wallet::create`.
#[derive(Debug, Clone)]
pub struct WalletParams {
    pub currency: Currency,
    /// Display unit; must be compatible with the currency's base unit.
    pub unit: Unit,
    pub fee_unit: Unit,
    pub default_fee_basis: FeeBasis,
    pub(crate) manager: Weak<ManagerInner>,
}

#[derive(Clone)]
pub struct Wallet {
    inner: Arc<WalletInner>,
}

pub(crate) struct WalletInner {
    id: WalletId,
    manager: Weak<ManagerInner>,
    currency: Currency,
    unit: Unit,
    fee_unit: Unit,
    mutable: RwLock<WalletMut>,
}

struct WalletMut {
    state: WalletState,
    default_fee_basis: FeeBasis,
    transfers: Vec<Transfer>,
    balance: Amount,
}

impl Wallet {
    pub fn create(params: WalletParams) -> Self {
        let balance = Amount::zero(&params.unit);
        Self {
            inner: Arc::new(WalletInner {
                id: WalletId::next(),
                manager: params.manager,
                currency: params.currency,
                unit: params.unit,
                fee_unit: params.fee_unit,
                mutable: RwLock::new(WalletMut {
                    state: WalletState::Created,
                    default_fee_basis: params.default_fee_basis,
                    transfers: Vec::new(),
                    balance,
                }),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<WalletInner>) -> Self { Self { inner } }
    pub(crate) fn downgrade(&self) -> Weak<WalletInner> { Arc::downgrade(&self.inner) }
    pub(crate) fn belongs_to(&self, manager: &Weak<ManagerInner>) -> bool { Weak::ptr_eq(&self.inner.manager, manager) }

    fn read(&self) -> RwLockReadGuard<'_, WalletMut> { self.inner.mutable.read().unwrap_or_else(|p| p.into_inner()) }
    fn write(&self) -> RwLockWriteGuard<'_, WalletMut> { self.inner.mutable.write().unwrap_or_else(|p| p.into_inner()) }

    pub fn id(&self) -> WalletId { self.inner.id }
    pub fn manager(&self) -> Option<WalletManager> { self.inner.manager.upgrade().map(WalletManager::from_inner) }
    pub fn currency(&self) -> &Currency { &self.inner.currency }
    pub fn unit(&self) -> &Unit { &self.inner.unit }
    pub fn fee_unit(&self) -> &Unit { &self.inner.fee_unit }
    pub fn state(&self) -> WalletState { self.read().state }
    pub fn default_fee_basis(&self) -> FeeBasis { self.read().default_fee_basis.clone() }
    pub fn balance(&self) -> Amount { self.read().balance.clone() }

    /// Snapshot in insertion order.
    pub fn transfers(&self) -> Vec<Transfer> { self.read().transfers.clone() }

    pub fn has_transfer(&self, transfer: &Transfer) -> bool { self.read().transfers.contains(transfer) }

    /// Transfer with the given hash, if any.
    pub fn lookup(&self, hash: &str) -> Option<Transfer> {
        self.read().transfers.iter().find(|t| t.hash().as_deref() == Some(hash)).cloned()
    }

    pub fn lookup_transfer(&self, id: TransferId) -> Option<Transfer> {
        self.read().transfers.iter().find(|t| t.id() == id).cloned()
    }

    /// Fee a transfer of `amount` would pay under `fee_basis`.
    pub fn estimate_fee(&self, amount: &Amount, fee_basis: &FeeBasis) -> Result<Amount> {
        if !amount.unit().is_compatible(&self.inner.unit) || !fee_basis.unit().is_compatible(&self.inner.fee_unit) {
            return Err(Error::IncompatibleUnit);
        }
        fee_basis.fee().ok_or_else(|| Error::InvalidAmount("fee overflow".into()))
    }

    /// Ask the network what sending `amount` to `target` would cost. The
    /// answer arrives as `WalletEvent::FeeBasisEstimated` carrying the
    /// returned id; the manager must be connected.
    pub fn estimate_fee_basis(&self, target: &Address, amount: &Amount) -> Result<FeeEstimateId> {
        let manager = self.manager().ok_or(Error::Deleted("wallet manager"))?;
        manager.request_fee_estimate(self, target, amount)
    }

    /// New outgoing transfer in `Created`. Emits `TransferEvent::Created` and
    /// `WalletEvent::TransferAdded`.
    pub fn create_transfer(&self, target: &Address, amount: &Amount, fee_basis: &FeeBasis) -> Result<Transfer> {
        let manager = self.manager().ok_or(Error::Deleted("wallet manager"))?;
        manager.create_outgoing_transfer(self, target, amount, fee_basis)
    }

    /// Replace the default fee basis. Emits `WalletEvent::FeeBasisUpdated`.
    pub fn set_default_fee_basis(&self, fee_basis: &FeeBasis) -> Result<()> {
        let manager = self.manager().ok_or(Error::Deleted("wallet manager"))?;
        manager.update_default_fee_basis(self, fee_basis)
    }

    // Mutators below are only called with the owning manager's lock held.

    pub(crate) fn set_state(&self, state: WalletState) -> WalletState {
        std::mem::replace(&mut self.write().state, state)
    }

    pub(crate) fn replace_default_fee_basis(&self, fee_basis: FeeBasis) {
        self.write().default_fee_basis = fee_basis;
    }

    pub(crate) fn push_transfer(&self, transfer: Transfer) { self.write().transfers.push(transfer) }

    pub(crate) fn remove_transfer(&self, transfer: &Transfer) -> bool {
        let mut guard = self.write();
        let before = guard.transfers.len();
        guard.transfers.retain(|t| t != transfer);
        guard.transfers.len() != before
    }

    /// Recompute the balance, charging the fees of `fee_payers` that are
    /// denominated in this currency; the new value if it changed.
    pub(crate) fn refresh_balance(&self, fee_payers: &[Transfer]) -> Option<Amount> {
        let mut guard = self.write();
        let balance = balance::compute(&self.inner.unit, &guard.transfers, fee_payers);
        if balance == guard.balance {
            return None;
        }
        guard.balance = balance.clone();
        Some(balance)
    }
}

impl PartialEq for Wallet {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }
}
impl Eq for Wallet {}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("id", &self.inner.id)
            .field("currency", &self.inner.currency.code())
            .finish()
    }
}
