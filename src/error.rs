//! Crate-wide error type.
//!
//! Per-entity failures (a sync pass, a rejected submission) never surface here:
//! they are absorbed into entity state and reported through listener events.
//! `Error` covers API misuse and local failures the caller can act on.

use crate::manager::WalletManagerState;
use crate::transfer::TransferStateKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid recovery phrase: {0}")]
    InvalidPhrase(String),

    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Phrase does not belong to account {0}")]
    AccountMismatch(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("A System is already active in this process")]
    SystemAlreadyActive,

    #[error("No tokio runtime available")]
    NoRuntime,

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Wallet manager already exists for {0}")]
    ManagerExists(String),

    #[error("Unknown wallet manager mode: {0}")]
    InvalidMode(String),

    #[error("Network {network} does not support mode {mode}")]
    UnsupportedMode { network: String, mode: String },

    #[error("Wallet manager cannot {operation} while {state:?}")]
    InvalidManagerState { operation: &'static str, state: WalletManagerState },

    #[error("Transfer cannot {operation} while {state:?}")]
    InvalidTransferState { operation: &'static str, state: TransferStateKind },

    #[error("Incompatible units")]
    IncompatibleUnit,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid address {address} for {network}")]
    InvalidAddress { address: String, network: String },

    #[error("Unknown currency {currency} on {network}")]
    UnknownCurrency { currency: String, network: String },

    #[error("{0} has been deleted")]
    Deleted(&'static str),

    #[error("Factory broke an invariant: {0}")]
    Factory(String),

    #[error("Storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
