//! BlockchainClient - the engine's only view of the outside world.
//!
//! Implementations talk to whatever backs a network (REST indexer, P2P node,
//! test double). Errors are plain `anyhow` errors; the engine turns them into
//! `SyncEnded { error }` and `Failed(reason)` strings.

use crate::network::Network;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A transfer as reported by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub hash: String,
    /// Currency uids on the network.
    pub currency: String,
    pub source: String,
    pub target: String,
    /// Base units.
    pub amount: u128,
    /// Base units of the network's fee currency.
    pub fee: u128,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub transaction_index: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Set when the chain rejected the transfer.
    #[serde(default)]
    pub error: Option<String>,
}

/// A signed transfer ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransfer {
    /// `TransferId` value of the originating transfer.
    pub transfer: u64,
    pub hash: String,
    pub currency: String,
    pub source: String,
    pub target: String,
    pub amount: u128,
    pub fee: u128,
    pub payload: String,
    pub signature: String,
}

/// A prospective transfer, priced before it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuery {
    pub currency: String,
    pub source: String,
    pub target: String,
    /// Base units.
    pub amount: u128,
}

/// Live chain update delivered by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainUpdate {
    Head(u64),
    Transfer(TransferRecord),
}

#[async_trait]
pub trait BlockchainClient: Send + Sync {
    async fn get_block_height(&self, network: &Network) -> Result<u64>;

    /// Transfers touching `addresses` in blocks `[begin, end)`, plus any still
    /// unconfirmed.
    async fn get_transfers(&self, network: &Network, addresses: &[String], begin: u64, end: u64) -> Result<Vec<TransferRecord>>;

    async fn submit_transfer(&self, network: &Network, transfer: &SignedTransfer) -> Result<()>;

    /// Current price per unit of cost (sat per kB, wei per gas) in the
    /// network's fee base unit. `None` keeps the catalog rate.
    async fn get_fee_rate(&self, network: &Network) -> Result<Option<u128>> {
        let _ = network;
        Ok(None)
    }

    /// Units of cost (kB, gas) `query` would consume. `None` keeps the
    /// currency's typical cost.
    async fn estimate_cost(&self, network: &Network, query: &FeeQuery) -> Result<Option<f64>> {
        let _ = (network, query);
        Ok(None)
    }

    /// Live heads and transfers. The channel closing means the connection was lost.
    async fn subscribe(&self, network: &Network, addresses: &[String]) -> Result<mpsc::Receiver<ChainUpdate>> {
        let _ = addresses;
        Err(anyhow!("{} subscriptions unsupported", network.uids()))
    }
}
