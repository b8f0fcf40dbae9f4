//! Manager-owned I/O tasks. They only talk to the `BlockchainClient` and post
//! announcements; all state changes happen in the main handler.

use super::announce::{Announcement, ManagerUpdate};
use super::{WalletManagerId, WalletManagerMode};
use crate::client::{BlockchainClient, ChainUpdate, FeeQuery, SignedTransfer};
use crate::config::SystemConfig;
use crate::network::Network;
use crate::system::dispatch::Dispatcher;
use crate::transfer::TransferId;
use crate::wallet::{FeeEstimateId, WalletId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SyncSettings {
    pub(crate) interval: Duration,
    pub(crate) chunk_blocks: u64,
}

impl SyncSettings {
    pub(crate) fn from_config(config: &SystemConfig) -> Self {
        Self { interval: config.sync_interval(), chunk_blocks: config.sync_chunk_blocks() }
    }
}

/// Everything a task needs, captured at spawn time.
#[derive(Clone)]
pub(super) struct IoContext {
    pub(super) manager: WalletManagerId,
    pub(super) epoch: u64,
    pub(super) network: Network,
    pub(super) mode: WalletManagerMode,
    pub(super) addresses: Vec<String>,
    pub(super) client: Arc<dyn BlockchainClient>,
    pub(super) dispatcher: Dispatcher,
    pub(super) settings: SyncSettings,
    pub(super) sync_lock: Arc<Mutex<()>>,
}

impl IoContext {
    fn announce(&self, update: ManagerUpdate) {
        self.dispatcher.announce(Announcement::Manager { manager: self.manager, epoch: self.epoch, update });
    }
}

/// Connect, then track the chain according to the mode until aborted.
pub(super) async fn run(ctx: IoContext, begin: u64) {
    let height = match ctx.client.get_block_height(&ctx.network).await {
        Ok(height) => height,
        Err(e) => {
            warn!(manager = %ctx.manager, network = %ctx.network, error = %e, "connect failed");
            ctx.announce(ManagerUpdate::Disconnected { reason: e.to_string() });
            return;
        }
    };
    info!(manager = %ctx.manager, network = %ctx.network, height, "connected");
    ctx.announce(ManagerUpdate::Connected { height });

    match ctx.mode {
        WalletManagerMode::ApiOnly => poll(ctx, begin).await,
        WalletManagerMode::P2pOnly | WalletManagerMode::Hybrid => {
            match ctx.client.subscribe(&ctx.network, &ctx.addresses).await {
                Ok(updates) => follow(ctx, begin, updates).await,
                Err(e) => {
                    warn!(manager = %ctx.manager, error = %e, "subscription unavailable; polling instead");
                    poll(ctx, begin).await
                }
            }
        }
    }
}

async fn poll(ctx: IoContext, mut cursor: u64) {
    loop {
        if let Some(height) = sync_pass(&ctx, cursor).await {
            cursor = height;
        }
        tokio::time::sleep(ctx.settings.interval).await;
    }
}

async fn follow(ctx: IoContext, begin: u64, mut updates: mpsc::Receiver<ChainUpdate>) {
    let mut cursor = sync_pass(&ctx, begin).await.unwrap_or(begin);
    while let Some(update) = updates.recv().await {
        match update {
            ChainUpdate::Head(height) => {
                ctx.announce(ManagerUpdate::BlockHeight { height });
                if ctx.mode == WalletManagerMode::Hybrid {
                    if let Some(height) = sync_pass(&ctx, cursor).await {
                        cursor = height;
                    }
                }
            }
            ChainUpdate::Transfer(record) => ctx.announce(ManagerUpdate::Transfers { records: vec![record] }),
        }
    }
    warn!(manager = %ctx.manager, "subscription closed");
    ctx.announce(ManagerUpdate::Disconnected { reason: "subscription closed".into() });
}

pub(super) async fn rescan(ctx: IoContext) {
    sync_pass(&ctx, 0).await;
}

/// Query `[begin, head]` in chunks. Returns the head reached, `None` on error.
/// Passes of one manager never overlap.
pub(super) async fn sync_pass(ctx: &IoContext, begin: u64) -> Option<u64> {
    let _guard = ctx.sync_lock.lock().await;
    ctx.announce(ManagerUpdate::SyncStarted);

    let head = match ctx.client.get_block_height(&ctx.network).await {
        Ok(height) => height,
        Err(e) => return fail(ctx, e),
    };
    ctx.announce(ManagerUpdate::BlockHeight { height: head });

    match ctx.client.get_fee_rate(&ctx.network).await {
        Ok(Some(rate)) => ctx.announce(ManagerUpdate::FeeRate { rate }),
        Ok(None) => {}
        Err(e) => warn!(manager = %ctx.manager, network = %ctx.network, error = %e, "fee rate unavailable"),
    }

    let start = begin.min(head);
    let stop = head.saturating_add(1);
    let mut cursor = start;
    while cursor < stop {
        let next = cursor.saturating_add(ctx.settings.chunk_blocks).min(stop);
        match ctx.client.get_transfers(&ctx.network, &ctx.addresses, cursor, next).await {
            Ok(records) if !records.is_empty() => ctx.announce(ManagerUpdate::Transfers { records }),
            Ok(_) => {}
            Err(e) => return fail(ctx, e),
        }
        let percent = (next - start) as f64 * 100.0 / (stop - start) as f64;
        ctx.announce(ManagerUpdate::SyncProgress { percent });
        cursor = next;
    }

    debug!(manager = %ctx.manager, start, head, "sync pass complete");
    ctx.announce(ManagerUpdate::SyncEnded { synced_height: Some(head), error: None });
    Some(head)
}

fn fail(ctx: &IoContext, error: anyhow::Error) -> Option<u64> {
    warn!(manager = %ctx.manager, network = %ctx.network, error = %error, "sync failed");
    ctx.announce(ManagerUpdate::SyncEnded { synced_height: None, error: Some(error.to_string()) });
    None
}

pub(super) async fn submit(ctx: IoContext, wallet: WalletId, transfer: TransferId, signed: SignedTransfer) {
    let result = ctx.client.submit_transfer(&ctx.network, &signed).await.map_err(|e| {
        warn!(manager = %ctx.manager, transfer = %transfer, error = %e, "submission rejected");
        e.to_string()
    });
    ctx.announce(ManagerUpdate::Submitted { wallet, transfer, result });
}

pub(super) async fn estimate(ctx: IoContext, wallet: WalletId, request: FeeEstimateId, query: FeeQuery) {
    let cost = ctx.client.estimate_cost(&ctx.network, &query).await.map_err(|e| {
        warn!(manager = %ctx.manager, %request, error = %e, "fee estimate failed");
        e.to_string()
    });
    ctx.announce(ManagerUpdate::FeeEstimate { wallet, request, cost });
}
