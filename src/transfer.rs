//! Transfer - one value movement and its forward-only state machine.
//!
//! ```text
//! Created → Signed → Submitted → Pending → Included(confirmation)
//!                                        ↘ Failed(reason)
//! any state except Deleted ──────────────→ Deleted
//! ```
//!
//! States may be skipped (a discovered transfer goes straight from `Created` to
//! `Included`) but never revisited. Mutation is crate-internal and happens under
//! the owning manager's lock; readers take a snapshot.

use crate::currency::{Amount, Unit};
use crate::network::{Address, FeeBasis};
use crate::wallet::{Wallet, WalletInner};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Process-unique transfer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(u64);

impl TransferId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 { self.0 }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "transfer-{}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Sent,
    Received,
    /// Sent to ourselves: only the fee leaves the wallet.
    Recovered,
}

/// Attached on inclusion; never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferConfirmation {
    pub block_number: u64,
    pub transaction_index: u64,
    pub timestamp: DateTime<Utc>,
    pub fee: Amount,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferState {
    Created,
    Signed,
    Submitted,
    Pending,
    Included(TransferConfirmation),
    Failed(String),
    Deleted,
}

/// Payload-free view of `TransferState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStateKind {
    Created,
    Signed,
    Submitted,
    Pending,
    Included,
    Failed,
    Deleted,
}

impl TransferState {
    pub fn kind(&self) -> TransferStateKind {
        match self {
            TransferState::Created => TransferStateKind::Created,
            TransferState::Signed => TransferStateKind::Signed,
            TransferState::Submitted => TransferStateKind::Submitted,
            TransferState::Pending => TransferStateKind::Pending,
            TransferState::Included(_) => TransferStateKind::Included,
            TransferState::Failed(_) => TransferStateKind::Failed,
            TransferState::Deleted => TransferStateKind::Deleted,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            TransferState::Created => 0,
            TransferState::Signed => 1,
            TransferState::Submitted => 2,
            TransferState::Pending => 3,
            TransferState::Included(_) | TransferState::Failed(_) => 4,
            TransferState::Deleted => 5,
        }
    }

    /// `Included`, `Failed` and `Deleted` admit no further progress.
    pub fn is_terminal(&self) -> bool { self.rank() >= 4 }

    pub fn can_transition_to(&self, next: &TransferState) -> bool {
        match (self, next) {
            (TransferState::Deleted, _) => false,
            (_, TransferState::Deleted) => true,
            _ => !self.is_terminal() && next.rank() > self.rank(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    Created,
    Changed { old: TransferState, new: TransferState },
    Deleted,
}

/// Inputs handed to a `TransferFactory`. Build the transfer with
/// `Transfer::create`; the wallet link is filled in by the engine.
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub unit: Unit,
    pub fee_unit: Unit,
    pub source: Option<Address>,
    pub target: Option<Address>,
    /// Non-negative magnitude; `direction` gives the sign.
    pub amount: Amount,
    pub direction: TransferDirection,
    pub fee_basis: FeeBasis,
    pub hash: Option<String>,
    pub(crate) wallet: Weak<WalletInner>,
}

#[derive(Clone)]
pub struct Transfer {
    inner: Arc<TransferInner>,
}

struct TransferInner {
    id: TransferId,
    wallet: Weak<WalletInner>,
    unit: Unit,
    fee_unit: Unit,
    source: Option<Address>,
    target: Option<Address>,
    amount: Amount,
    direction: TransferDirection,
    fee_basis: FeeBasis,
    mutable: RwLock<TransferMut>,
}

struct TransferMut {
    state: TransferState,
    hash: Option<String>,
    signature: Option<Vec<u8>>,
}

impl Transfer {
    /// Every transfer starts in `Created`.
    pub fn create(params: TransferParams) -> Self {
        Self {
            inner: Arc::new(TransferInner {
                id: TransferId::next(),
                wallet: params.wallet,
                unit: params.unit,
                fee_unit: params.fee_unit,
                source: params.source,
                target: params.target,
                amount: params.amount,
                direction: params.direction,
                fee_basis: params.fee_basis,
                mutable: RwLock::new(TransferMut { state: TransferState::Created, hash: params.hash, signature: None }),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TransferMut> { self.inner.mutable.read().unwrap_or_else(|p| p.into_inner()) }
    fn write(&self) -> RwLockWriteGuard<'_, TransferMut> { self.inner.mutable.write().unwrap_or_else(|p| p.into_inner()) }

    pub fn id(&self) -> TransferId { self.inner.id }
    pub fn wallet(&self) -> Option<Wallet> { self.inner.wallet.upgrade().map(Wallet::from_inner) }
    pub fn unit(&self) -> &Unit { &self.inner.unit }
    pub fn fee_unit(&self) -> &Unit { &self.inner.fee_unit }
    pub fn source(&self) -> Option<&Address> { self.inner.source.as_ref() }
    pub fn target(&self) -> Option<&Address> { self.inner.target.as_ref() }
    pub fn amount(&self) -> &Amount { &self.inner.amount }
    pub fn direction(&self) -> TransferDirection { self.inner.direction }
    pub fn fee_basis(&self) -> &FeeBasis { &self.inner.fee_basis }

    /// Amount signed by direction: negative when value leaves the wallet.
    pub fn amount_directed(&self) -> Amount {
        match self.inner.direction {
            TransferDirection::Received => self.inner.amount.clone(),
            TransferDirection::Sent => self.inner.amount.negate(),
            TransferDirection::Recovered => Amount::zero(&self.inner.unit),
        }
    }

    pub fn state(&self) -> TransferState { self.read().state.clone() }
    pub fn hash(&self) -> Option<String> { self.read().hash.clone() }
    pub fn is_signed(&self) -> bool { self.read().signature.is_some() }

    pub fn confirmation(&self) -> Option<TransferConfirmation> {
        match &self.read().state {
            TransferState::Included(confirmation) => Some(confirmation.clone()),
            _ => None,
        }
    }

    /// Confirmed fee once included, the fee-basis estimate before.
    pub fn fee(&self) -> Option<Amount> {
        match self.confirmation() {
            Some(confirmation) => Some(confirmation.fee),
            None => self.inner.fee_basis.fee(),
        }
    }

    /// Blocks since inclusion, counting the including block, against the
    /// manager's current height.
    pub fn confirmations(&self) -> Option<u64> {
        let confirmation = self.confirmation()?;
        let height = self.wallet()?.manager()?.height();
        (height >= confirmation.block_number).then(|| height - confirmation.block_number + 1)
    }

    pub(crate) fn belongs_to(&self, wallet: &Weak<WalletInner>) -> bool { Weak::ptr_eq(&self.inner.wallet, wallet) }

    /// Move to `next`, returning the previous state.
    pub(crate) fn set_state(&self, next: TransferState, operation: &'static str) -> Result<TransferState> {
        let mut guard = self.write();
        if !guard.state.can_transition_to(&next) {
            return Err(Error::InvalidTransferState { operation, state: guard.state.kind() });
        }
        Ok(std::mem::replace(&mut guard.state, next))
    }

    pub(crate) fn set_signature(&self, signature: Vec<u8>, hash: String) {
        let mut guard = self.write();
        guard.signature = Some(signature);
        guard.hash = Some(hash);
    }

    pub(crate) fn signature(&self) -> Option<Vec<u8>> { self.read().signature.clone() }
}

impl PartialEq for Transfer {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }
}
impl Eq for Transfer {}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.read();
        f.debug_struct("Transfer")
            .field("id", &self.inner.id)
            .field("direction", &self.inner.direction)
            .field("amount", &self.inner.amount.string_base10())
            .field("state", &guard.state.kind())
            .field("hash", &guard.hash)
            .finish()
    }
}
