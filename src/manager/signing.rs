use crate::client::SignedTransfer;
use crate::error::{Error, Result};
use crate::network::{Network, NetworkType};
use crate::transfer::Transfer;
use crate::wallet::Wallet;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// Canonical bytes committed to by the signature.
#[derive(Serialize)]
struct Payload<'a> {
    network: &'a str,
    currency: &'a str,
    transfer: u64,
    source: String,
    target: String,
    amount: String,
    fee: String,
}

pub(super) fn payload(network: &Network, wallet: &Wallet, transfer: &Transfer) -> Result<Vec<u8>> {
    let payload = Payload {
        network: network.uids(),
        currency: wallet.currency().uids(),
        transfer: transfer.id().value(),
        source: transfer.source().map(ToString::to_string).unwrap_or_default(),
        target: transfer.target().map(ToString::to_string).unwrap_or_default(),
        amount: transfer.amount().string_base10(),
        fee: transfer.fee().map(|fee| fee.string_base10()).unwrap_or_default(),
    };
    Ok(serde_json::to_vec(&payload)?)
}

fn sha256d(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(bytes)).into()
}

pub(super) fn digest(payload: &[u8]) -> [u8; 32] { sha256d(payload) }

/// Identifier of the signed transaction, in the network's usual notation.
pub(super) fn transaction_hash(network: &Network, payload: &[u8], signature: &[u8]) -> String {
    let mut signed = payload.to_vec();
    signed.extend_from_slice(signature);
    match network.type_() {
        NetworkType::Ethereum => format!("0x{}", hex::encode(Keccak256::digest(&signed))),
        NetworkType::Bitcoin | NetworkType::BitcoinCash => {
            let mut hash = sha256d(&signed);
            hash.reverse();
            hex::encode(hash)
        }
    }
}

pub(super) fn signed_transfer(network: &Network, wallet: &Wallet, transfer: &Transfer) -> Result<SignedTransfer> {
    let signature = transfer.signature().ok_or_else(|| Error::Signing("transfer has no signature".into()))?;
    let hash = transfer.hash().ok_or_else(|| Error::Signing("transfer has no hash".into()))?;
    let payload = payload(network, wallet, transfer)?;
    Ok(SignedTransfer {
        transfer: transfer.id().value(),
        hash,
        currency: wallet.currency().uids().into(),
        source: transfer.source().map(ToString::to_string).unwrap_or_default(),
        target: transfer.target().map(ToString::to_string).unwrap_or_default(),
        amount: transfer.amount().value(),
        fee: transfer.fee().map(|fee| fee.value()).unwrap_or(0),
        payload: hex::encode(payload),
        signature: hex::encode(signature),
    })
}
