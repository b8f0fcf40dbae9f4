//! Per-network key derivation, addresses and signing.
//!
//! ```text
//! BIP39 seed
//!     ├── m/84'/0'/0'/0/0   → Bitcoin (P2WPKH)      [testnet coin 1']
//!     ├── m/44'/145'/0'/0/0 → Bitcoin Cash (P2PKH)  [testnet coin 1']
//!     └── m/44'/60'/0'/0/0  → Ethereum (keccak of uncompressed pubkey)
//! ```
//!
//! Curve math is delegated to the `bitcoin` crate (secp256k1) and `sha3`.

use crate::error::{Error, Result};
use crate::network::address::{bitcoin_network, eip55_checksum};
use crate::network::{Address, Network, NetworkType};
use bitcoin::bip32::{DerivationPath, Fingerprint, Xpriv, Xpub};
use bitcoin::secp256k1::{Message, Secp256k1};
use sha3::{Digest, Keccak256};
use std::str::FromStr;

fn derivation_path(network: &Network) -> &'static str {
    match (network.type_(), network.is_mainnet()) {
        (NetworkType::Bitcoin, true) => "m/84'/0'/0'/0/0",
        (NetworkType::Bitcoin, false) => "m/84'/1'/0'/0/0",
        (NetworkType::BitcoinCash, true) => "m/44'/145'/0'/0/0",
        (NetworkType::BitcoinCash, false) => "m/44'/1'/0'/0/0",
        (NetworkType::Ethereum, _) => "m/44'/60'/0'/0/0",
    }
}

/// Identifies the seed without revealing it.
pub(super) fn fingerprint(seed: &[u8; 64]) -> Result<Fingerprint> {
    let secp = Secp256k1::new();
    let master = Xpriv::new_master(bitcoin::Network::Bitcoin, seed).map_err(|e| Error::Derivation(e.to_string()))?;
    Ok(master.fingerprint(&secp))
}

fn derive_key(seed: &[u8; 64], network: &Network) -> Result<Xpriv> {
    let secp = Secp256k1::new();
    let master = Xpriv::new_master(bitcoin_network(network.is_mainnet()), seed)
        .map_err(|e| Error::Derivation(e.to_string()))?;
    let path = DerivationPath::from_str(derivation_path(network)).map_err(|e| Error::Derivation(e.to_string()))?;
    master.derive_priv(&secp, &path).map_err(|e| Error::Derivation(e.to_string()))
}

/// Receive address of the account on `network`.
pub(super) fn derive_address(seed: &[u8; 64], network: &Network) -> Result<Address> {
    let secp = Secp256k1::new();
    let xpriv = derive_key(seed, network)?;
    let value = match network.type_() {
        NetworkType::Bitcoin => {
            let pk = Xpub::from_priv(&secp, &xpriv).to_pub();
            bitcoin::Address::p2wpkh(&pk, bitcoin_network(network.is_mainnet())).to_string()
        }
        NetworkType::BitcoinCash => {
            let pk = Xpub::from_priv(&secp, &xpriv).to_pub();
            bitcoin::Address::p2pkh(pk.pubkey_hash(), bitcoin_network(network.is_mainnet())).to_string()
        }
        NetworkType::Ethereum => {
            let pk = xpriv.private_key.public_key(&secp).serialize_uncompressed();
            let hash = Keccak256::digest(&pk[1..]);
            let bytes: [u8; 20] = hash[12..]
                .try_into()
                .map_err(|_| Error::Derivation("keccak output".into()))?;
            eip55_checksum(&bytes)
        }
    };
    Ok(Address::new(value, network))
}

/// DER-encoded ECDSA signature of `digest` with the account key for `network`.
pub(super) fn sign_digest(seed: &[u8; 64], network: &Network, digest: [u8; 32]) -> Result<Vec<u8>> {
    let secp = Secp256k1::new();
    let xpriv = derive_key(seed, network)?;
    let signature = secp.sign_ecdsa(&Message::from_digest(digest), &xpriv.private_key);
    Ok(signature.serialize_der().to_vec())
}
