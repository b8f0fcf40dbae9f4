//! Shared fixtures: scripted blockchain client, recording listener, system guard.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, Notify};
use walletcore::{
    Account, BlockchainClient, ChainUpdate, Error, FeeBasis, FeeEstimateId, FeeQuery, Network, NetworkEvent, SignedTransfer, System, SystemConfig,
    SystemListener, Transfer, TransferEvent, TransferId, TransferRecord, TransferState, Wallet, WalletEvent, WalletId,
    WalletManager, WalletManagerEvent, WalletManagerId, WalletManagerState,
};
use std::fmt::Debug;

// Test mnemonic (well-known, never use with real funds)
pub const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const OTHER_MNEMONIC: &str = "legal winner thank year wave sausage worth useful legal winner thank yellow";

pub const BTC_OWN: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";
pub const BTC_OTHER: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";
pub const ETH_OWN: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";
pub const ETH_OTHER: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

static SYSTEM_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Only one System may live per process; tests in a binary take turns.
pub fn lock_system() -> MutexGuard<'static, ()> {
    SYSTEM_LOCK.lock().unwrap_or_else(|p| p.into_inner())
}

// =============================================================================
// Scripted client
// =============================================================================

#[derive(Default)]
struct Script {
    height: u64,
    records: Vec<TransferRecord>,
    fail_height: bool,
    fail_transfers: bool,
    reject_submit: Option<String>,
    hold_height: bool,
    hold_submit: bool,
    hold_estimate: bool,
    subscriptions: bool,
    feed: Option<mpsc::Sender<ChainUpdate>>,
    fee_rate: Option<u128>,
    cost: Option<f64>,
    fail_cost: bool,
    submitted: Vec<SignedTransfer>,
    queries: Vec<(u64, u64)>,
    estimates: Vec<FeeQuery>,
}

#[derive(Default)]
pub struct MockClient {
    script: Mutex<Script>,
    release: Notify,
}

impl MockClient {
    pub fn new(height: u64) -> Arc<Self> {
        let client = Self::default();
        client.script().height = height;
        Arc::new(client)
    }

    fn script(&self) -> MutexGuard<'_, Script> { self.script.lock().unwrap_or_else(|p| p.into_inner()) }

    pub fn set_height(&self, height: u64) { self.script().height = height }
    pub fn add_record(&self, record: TransferRecord) { self.script().records.push(record) }
    pub fn replace_records(&self, records: Vec<TransferRecord>) { self.script().records = records }
    pub fn fail_height(&self, fail: bool) { self.script().fail_height = fail }
    pub fn fail_transfers(&self, fail: bool) { self.script().fail_transfers = fail }
    pub fn reject_submit(&self, reason: Option<&str>) { self.script().reject_submit = reason.map(Into::into) }
    pub fn hold_height(&self, hold: bool) { self.script().hold_height = hold }
    pub fn hold_submit(&self, hold: bool) { self.script().hold_submit = hold }
    pub fn hold_estimate(&self, hold: bool) { self.script().hold_estimate = hold }
    pub fn enable_subscriptions(&self) { self.script().subscriptions = true }
    pub fn set_fee_rate(&self, rate: Option<u128>) { self.script().fee_rate = rate }
    pub fn set_cost(&self, cost: Option<f64>) { self.script().cost = cost }
    pub fn fail_cost(&self, fail: bool) { self.script().fail_cost = fail }

    /// Wake every held call.
    pub fn release(&self) { self.release.notify_waiters() }

    pub fn submitted(&self) -> Vec<SignedTransfer> { self.script().submitted.clone() }
    pub fn queries(&self) -> Vec<(u64, u64)> { self.script().queries.clone() }
    pub fn estimates(&self) -> Vec<FeeQuery> { self.script().estimates.clone() }

    /// Push a live update to the current subscriber.
    pub async fn push(&self, update: ChainUpdate) -> bool {
        let feed = self.script().feed.clone();
        match feed {
            Some(feed) => feed.send(update).await.is_ok(),
            None => false,
        }
    }

    /// Close the live feed, as a dropped connection would.
    pub fn close_feed(&self) { self.script().feed = None }
}

#[async_trait]
impl BlockchainClient for MockClient {
    async fn get_block_height(&self, _network: &Network) -> Result<u64> {
        let hold = self.script().hold_height;
        if hold {
            self.release.notified().await;
        }
        let script = self.script();
        if script.fail_height {
            return Err(anyhow!("height unavailable"));
        }
        Ok(script.height)
    }

    async fn get_transfers(&self, _network: &Network, addresses: &[String], begin: u64, end: u64) -> Result<Vec<TransferRecord>> {
        let mut script = self.script();
        script.queries.push((begin, end));
        if script.fail_transfers {
            return Err(anyhow!("indexer timeout"));
        }
        let tip = script.height;
        Ok(script
            .records
            .iter()
            .filter(|r| addresses.contains(&r.source) || addresses.contains(&r.target))
            .filter(|r| match r.block_number {
                Some(block) => block >= begin && block < end,
                None => end > tip,
            })
            .cloned()
            .collect())
    }

    async fn submit_transfer(&self, _network: &Network, transfer: &SignedTransfer) -> Result<()> {
        let hold = self.script().hold_submit;
        if hold {
            self.release.notified().await;
        }
        let mut script = self.script();
        script.submitted.push(transfer.clone());
        match &script.reject_submit {
            Some(reason) => Err(anyhow!("{}", reason)),
            None => Ok(()),
        }
    }

    async fn get_fee_rate(&self, _network: &Network) -> Result<Option<u128>> {
        Ok(self.script().fee_rate)
    }

    async fn estimate_cost(&self, _network: &Network, query: &FeeQuery) -> Result<Option<f64>> {
        let hold = self.script().hold_estimate;
        if hold {
            self.release.notified().await;
        }
        let mut script = self.script();
        script.estimates.push(query.clone());
        if script.fail_cost {
            return Err(anyhow!("estimator offline"));
        }
        Ok(script.cost)
    }

    async fn subscribe(&self, network: &Network, _addresses: &[String]) -> Result<mpsc::Receiver<ChainUpdate>> {
        let mut script = self.script();
        if !script.subscriptions {
            return Err(anyhow!("{} subscriptions unsupported", network.uids()));
        }
        let (tx, rx) = mpsc::channel(16);
        script.feed = Some(tx);
        Ok(rx)
    }
}

pub fn record(hash: &str, currency: &str, source: &str, target: &str, amount: u128, fee: u128, block: Option<u64>) -> TransferRecord {
    TransferRecord {
        hash: hash.into(),
        currency: currency.into(),
        source: source.into(),
        target: target.into(),
        amount,
        fee,
        block_number: block,
        transaction_index: block.map(|_| 0),
        timestamp: block.map(|_| Utc::now()),
        error: None,
    }
}

pub fn btc_record(hash: &str, source: &str, target: &str, amount: u128, fee: u128, block: Option<u64>) -> TransferRecord {
    record(hash, "bitcoin-mainnet:__native__", source, target, amount, fee, block)
}

// =============================================================================
// Recording listener
// =============================================================================

#[derive(Debug, Clone)]
pub enum Recorded {
    Network(String, NetworkEvent),
    Manager(WalletManagerId, WalletManagerEvent),
    Wallet(WalletId, WalletEvent),
    Transfer(TransferId, TransferEvent),
}

#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    fn push(&self, event: Recorded) { self.events.lock().unwrap_or_else(|p| p.into_inner()).push(event) }

    pub fn events(&self) -> Vec<Recorded> { self.events.lock().unwrap_or_else(|p| p.into_inner()).clone() }

    pub fn networks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Network(uids, NetworkEvent::Created) => Some(uids),
                _ => None,
            })
            .collect()
    }

    pub fn manager_events(&self, id: WalletManagerId) -> Vec<WalletManagerEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Manager(m, event) if m == id => Some(event),
                _ => None,
            })
            .collect()
    }

    pub fn wallet_events(&self, id: WalletId) -> Vec<WalletEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Wallet(w, event) if w == id => Some(event),
                _ => None,
            })
            .collect()
    }

    pub fn transfer_events(&self, id: TransferId) -> Vec<TransferEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Transfer(t, event) if t == id => Some(event),
                _ => None,
            })
            .collect()
    }

    /// `(old, new)` of every manager `Changed` event, in delivery order.
    pub fn manager_changes(&self, id: WalletManagerId) -> Vec<(WalletManagerState, WalletManagerState)> {
        self.manager_events(id)
            .into_iter()
            .filter_map(|e| match e {
                WalletManagerEvent::Changed { old, new } => Some((old, new)),
                _ => None,
            })
            .collect()
    }

    /// `(old, new)` of every transfer `Changed` event, in delivery order.
    pub fn transfer_changes(&self, id: TransferId) -> Vec<(TransferState, TransferState)> {
        self.transfer_events(id)
            .into_iter()
            .filter_map(|e| match e {
                TransferEvent::Changed { old, new } => Some((old, new)),
                _ => None,
            })
            .collect()
    }

    /// Outcome of the `TransferSubmitted` events delivered for `transfer`.
    pub fn submissions(&self, wallet: WalletId, transfer: &Transfer) -> Vec<bool> {
        self.wallet_events(wallet)
            .into_iter()
            .filter_map(|e| match e {
                WalletEvent::TransferSubmitted { transfer: t, success } if t == *transfer => Some(success),
                _ => None,
            })
            .collect()
    }

    /// Answers to fee estimate requests, in delivery order.
    pub fn fee_estimates(&self, wallet: WalletId) -> Vec<(FeeEstimateId, std::result::Result<FeeBasis, String>)> {
        self.wallet_events(wallet)
            .into_iter()
            .filter_map(|e| match e {
                WalletEvent::FeeBasisEstimated { request, result } => Some((request, result)),
                _ => None,
            })
            .collect()
    }

    pub fn sync_errors(&self, id: WalletManagerId) -> Vec<Option<String>> {
        self.manager_events(id)
            .into_iter()
            .filter_map(|e| match e {
                WalletManagerEvent::SyncEnded { error } => Some(error),
                _ => None,
            })
            .collect()
    }
}

impl SystemListener for RecordingListener {
    fn handle_network_event(&self, network: &Network, event: NetworkEvent) {
        self.push(Recorded::Network(network.uids().into(), event));
    }

    fn handle_manager_event(&self, manager: &WalletManager, event: WalletManagerEvent) {
        self.push(Recorded::Manager(manager.id(), event));
    }

    fn handle_wallet_event(&self, _manager: &WalletManager, wallet: &Wallet, event: WalletEvent) {
        self.push(Recorded::Wallet(wallet.id(), event));
    }

    fn handle_transfer_event(&self, _manager: &WalletManager, _wallet: &Wallet, transfer: &Transfer, event: TransferEvent) {
        self.push(Recorded::Transfer(transfer.id(), event));
    }
}

/// Each change must start where the previous one ended.
pub fn assert_chained<S: PartialEq + Debug>(changes: &[(S, S)]) {
    for pair in changes.windows(2) {
        assert_eq!(pair[0].1, pair[1].0, "{:?} does not follow {:?}", pair[1], pair[0]);
    }
}

// =============================================================================
// System helpers
// =============================================================================

pub fn account() -> Account {
    Account::create_from_phrase(TEST_MNEMONIC, Utc::now()).expect("account")
}

/// Mainnet config rooted in `dir`, with a poll interval long enough that only
/// the initial pass and explicit `sync()` calls query the client.
pub fn config(dir: &TempDir) -> SystemConfig {
    SystemConfig::new()
        .with_storage_root(dir.path())
        .with_mainnet(true)
        .with_sync_interval(Duration::from_secs(3600))
        .with_sync_chunk_blocks(50)
}

/// Create a System, waiting out the teardown of a previous one.
pub async fn start_system(config: SystemConfig, client: Arc<MockClient>, listener: &Arc<RecordingListener>) -> System {
    walletcore::init_logging();
    let client: Arc<dyn BlockchainClient> = client;
    for _ in 0..100 {
        match System::create(config.clone(), account(), client.clone(), listener) {
            Ok(system) => return system,
            Err(Error::SystemAlreadyActive) => tokio::time::sleep(Duration::from_millis(10)).await,
            Err(e) => panic!("system: {}", e),
        }
    }
    panic!("previous system never shut down");
}

/// Flush until `check` holds, up to about two seconds.
pub async fn eventually(system: &System, mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        system.flush().await;
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub fn network(system: &System, uids: &str) -> Network {
    system.lookup_network(uids).expect("network")
}
