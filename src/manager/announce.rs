//! Announcements - results of manager I/O, applied by the System's main handler.

use super::{ManagerCore, WalletManager, WalletManagerEvent, WalletManagerId, WalletManagerState};
use crate::client::TransferRecord;
use crate::currency::{Amount, Unit};
use crate::error::{Error, Result};
use crate::network::{Address, FeeBasis};
use crate::transfer::{TransferConfirmation, TransferDirection, TransferId, TransferParams, TransferState};
use crate::wallet::{FeeEstimateId, WalletEvent, WalletId};
use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub(crate) enum Announcement {
    Manager { manager: WalletManagerId, epoch: u64, update: ManagerUpdate },
    /// Resolved once everything queued before it has reached the listener.
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
pub(crate) enum ManagerUpdate {
    Connected { height: u64 },
    Disconnected { reason: String },
    BlockHeight { height: u64 },
    SyncStarted,
    SyncProgress { percent: f64 },
    Transfers { records: Vec<TransferRecord> },
    SyncEnded { synced_height: Option<u64>, error: Option<String> },
    Submitted { wallet: WalletId, transfer: TransferId, result: std::result::Result<(), String> },
    FeeRate { rate: u128 },
    FeeEstimate { wallet: WalletId, request: FeeEstimateId, cost: std::result::Result<Option<f64>, String> },
}

/// State a record puts its transfer in.
fn record_state(record: &TransferRecord, fee_unit: &Unit) -> TransferState {
    if let Some(error) = &record.error {
        return TransferState::Failed(error.clone());
    }
    match record.block_number {
        Some(block_number) => TransferState::Included(TransferConfirmation {
            block_number,
            transaction_index: record.transaction_index.unwrap_or(0),
            timestamp: record.timestamp.unwrap_or_else(Utc::now),
            fee: Amount::from_base(record.fee, false, fee_unit),
        }),
        None => TransferState::Pending,
    }
}

impl WalletManager {
    pub(crate) fn handle_announcement(&self, epoch: u64, update: ManagerUpdate) {
        let mut core = self.lock();
        if core.state == WalletManagerState::Deleted || epoch != core.epoch {
            debug!(manager = %self.inner.id, epoch, current = core.epoch, "discarding stale announcement");
            return;
        }

        match update {
            ManagerUpdate::Connected { height } => {
                if matches!(core.state, WalletManagerState::Created | WalletManagerState::Disconnected) {
                    self.set_state_locked(&mut core, WalletManagerState::Connected);
                }
                self.update_height_locked(height);
            }
            ManagerUpdate::Disconnected { reason } => {
                warn!(manager = %self.inner.id, reason = %reason, "connection lost");
                self.quiesce_locked(&mut core);
                if core.state == WalletManagerState::Syncing {
                    self.emit(WalletManagerEvent::SyncEnded { error: Some(reason) });
                }
                self.set_state_locked(&mut core, WalletManagerState::Disconnected);
            }
            ManagerUpdate::BlockHeight { height } => self.update_height_locked(height),
            ManagerUpdate::SyncStarted => {
                if core.state == WalletManagerState::Connected {
                    self.set_state_locked(&mut core, WalletManagerState::Syncing);
                    self.emit(WalletManagerEvent::SyncStarted);
                }
            }
            ManagerUpdate::SyncProgress { percent } => {
                if core.state == WalletManagerState::Syncing {
                    self.emit(WalletManagerEvent::SyncProgress { percent });
                }
            }
            ManagerUpdate::Transfers { records } => {
                let mut changed = false;
                for record in &records {
                    match self.apply_record_locked(&mut core, record) {
                        Ok(true) => changed |= core.store.upsert(record),
                        Ok(false) => {}
                        Err(e) => warn!(manager = %self.inner.id, hash = %record.hash, error = %e, "record skipped"),
                    }
                }
                if changed {
                    self.persist_locked(&core);
                }
            }
            ManagerUpdate::SyncEnded { synced_height, error } => {
                if let Some(height) = synced_height {
                    if height > core.store.last_synced_height {
                        core.store.last_synced_height = height;
                        self.persist_locked(&core);
                    }
                }
                if core.state == WalletManagerState::Syncing {
                    self.emit(WalletManagerEvent::SyncEnded { error });
                    self.set_state_locked(&mut core, WalletManagerState::Connected);
                }
            }
            ManagerUpdate::Submitted { wallet, transfer, result } => {
                core.submissions.retain(|pending| *pending != (wallet, transfer));
                let Some(wallet) = core.wallets.iter().find(|w| w.id() == wallet).cloned() else {
                    debug!(manager = %self.inner.id, %wallet, "submission for unknown wallet");
                    return;
                };
                let Some(transfer) = wallet.lookup_transfer(transfer) else {
                    debug!(manager = %self.inner.id, %transfer, "submission for removed transfer");
                    return;
                };
                let (next, success) = match result {
                    Ok(()) => (TransferState::Submitted, true),
                    Err(reason) => (TransferState::Failed(reason), false),
                };
                match self.transition_locked(&core, &wallet, &transfer, next, "submit") {
                    Ok(()) => self.emit_wallet(&wallet, WalletEvent::TransferSubmitted { transfer, success }),
                    Err(e) => debug!(manager = %self.inner.id, error = %e, "submission result superseded"),
                }
            }
            ManagerUpdate::FeeRate { rate } => {
                for wallet in &core.wallets {
                    let current = wallet.default_fee_basis();
                    let price = Amount::from_base(rate, false, wallet.fee_unit());
                    if *current.price_per_cost_factor() == price {
                        continue;
                    }
                    if let Some(fee_basis) = FeeBasis::new(price, current.cost_factor()) {
                        wallet.replace_default_fee_basis(fee_basis.clone());
                        self.emit_wallet(wallet, WalletEvent::FeeBasisUpdated { fee_basis });
                    }
                }
                debug!(manager = %self.inner.id, rate, "fee rate updated");
            }
            ManagerUpdate::FeeEstimate { wallet, request, cost } => {
                core.estimates.retain(|pending| *pending != (wallet, request));
                let Some(wallet) = core.wallets.iter().find(|w| w.id() == wallet) else {
                    debug!(manager = %self.inner.id, %wallet, "estimate for unknown wallet");
                    return;
                };
                let basis = wallet.default_fee_basis();
                let result = cost.and_then(|cost| {
                    let cost = cost.unwrap_or(basis.cost_factor());
                    FeeBasis::new(basis.price_per_cost_factor().clone(), cost).ok_or_else(|| format!("invalid cost {}", cost))
                });
                self.emit_wallet(wallet, WalletEvent::FeeBasisEstimated { request, result });
            }
        }
    }

    /// Fold one discovered record into the wallets. `Ok(false)` when the
    /// record does not involve this account or would not move its transfer
    /// forward.
    pub(super) fn apply_record_locked(&self, core: &mut ManagerCore, record: &TransferRecord) -> Result<bool> {
        let network = &self.inner.network;
        let currency = network.currency_by_uids(&record.currency).ok_or_else(|| Error::UnknownCurrency {
            currency: record.currency.clone(),
            network: network.uids().into(),
        })?;

        let own = &self.inner.context.address;
        let source = Address::parse(network, &record.source);
        let target = Address::parse(network, &record.target);
        let direction = match (source.as_ref() == Some(own), target.as_ref() == Some(own)) {
            (true, true) => TransferDirection::Recovered,
            (true, false) => TransferDirection::Sent,
            (false, true) => TransferDirection::Received,
            (false, false) => {
                debug!(manager = %self.inner.id, hash = %record.hash, "record does not involve the account");
                return Ok(false);
            }
        };

        let wallet = self.register_wallet_locked(core, &currency)?;
        let transfer = match wallet.lookup(&record.hash) {
            Some(transfer) => transfer,
            None => {
                let fee_unit = wallet.fee_unit().clone();
                let fee_basis = FeeBasis::new(Amount::from_base(record.fee, false, &fee_unit), 1.0)
                    .ok_or_else(|| Error::InvalidAmount(format!("fee {}", record.fee)))?;
                let params = TransferParams {
                    unit: wallet.unit().clone(),
                    fee_unit,
                    source,
                    target,
                    amount: Amount::from_base(record.amount, false, wallet.unit()),
                    direction,
                    fee_basis,
                    hash: Some(record.hash.clone()),
                    wallet: wallet.downgrade(),
                };
                self.create_transfer_locked(&wallet, params)?
            }
        };

        let next = record_state(record, wallet.fee_unit());
        if !transfer.state().can_transition_to(&next) {
            return Ok(false);
        }
        self.transition_locked(core, &wallet, &transfer, next, "sync")?;
        Ok(true)
    }
}
