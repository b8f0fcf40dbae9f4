//! Address - network-specific, string-convertible identifier.

use super::{Network, NetworkType};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Canonical address on one network. An address valid on one network is not
/// assumed valid on any other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    value: String,
    network_type: NetworkType,
    is_mainnet: bool,
}

impl Address {
    /// Validate `string` for `network` and return it in canonical form.
    pub fn parse(network: &Network, string: &str) -> Option<Self> {
        let value = match network.type_() {
            NetworkType::Bitcoin => parse_bitcoin(string, network.is_mainnet(), false)?,
            NetworkType::BitcoinCash => parse_bitcoin(string, network.is_mainnet(), true)?,
            NetworkType::Ethereum => parse_ethereum(string)?,
        };
        Some(Self::new(value, network))
    }

    /// Already-canonical address produced by key derivation.
    pub(crate) fn new(value: String, network: &Network) -> Self {
        Self { value, network_type: network.type_(), is_mainnet: network.is_mainnet() }
    }

    pub fn as_str(&self) -> &str { &self.value }

    pub fn is_for(&self, network: &Network) -> bool {
        self.network_type == network.type_() && self.is_mainnet == network.is_mainnet()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.value) }
}

pub(crate) fn bitcoin_network(mainnet: bool) -> bitcoin::Network {
    if mainnet { bitcoin::Network::Bitcoin } else { bitcoin::Network::Testnet }
}

fn parse_bitcoin(string: &str, mainnet: bool, legacy_only: bool) -> Option<String> {
    let address = bitcoin::Address::from_str(string.trim())
        .ok()?
        .require_network(bitcoin_network(mainnet))
        .ok()?;
    if legacy_only {
        match address.address_type()? {
            bitcoin::AddressType::P2pkh | bitcoin::AddressType::P2sh => {}
            _ => return None,
        }
    }
    Some(address.to_string())
}

fn parse_ethereum(string: &str) -> Option<String> {
    let string = string.trim();
    let hex_part = string.strip_prefix("0x").or_else(|| string.strip_prefix("0X"))?;
    let bytes: [u8; 20] = hex::decode(hex_part).ok()?.try_into().ok()?;
    let canonical = eip55_checksum(&bytes);
    let mixed = hex_part.chars().any(|c| c.is_ascii_lowercase()) && hex_part.chars().any(|c| c.is_ascii_uppercase());
    if mixed && canonical[2..] != *hex_part {
        return None;
    }
    Some(canonical)
}

/// `0x`-prefixed EIP-55 mixed-case encoding.
pub(crate) fn eip55_checksum(bytes: &[u8; 20]) -> String {
    let lower = hex::encode(bytes);
    let hash = Keccak256::digest(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 { out.push(c.to_ascii_uppercase()) } else { out.push(c) }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(uids: &str) -> Network {
        Network::catalog(uids.ends_with("mainnet")).into_iter().find(|n| n.uids() == uids).unwrap()
    }

    #[test]
    fn bitcoin_addresses_are_network_specific() {
        let main = network("bitcoin-mainnet");
        let test = network("bitcoin-testnet");
        let segwit = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";
        assert!(Address::parse(&main, segwit).is_some());
        assert!(Address::parse(&test, segwit).is_none());
        assert!(Address::parse(&test, "tb1q6rz28mcfaxtmd6v789l9rrlrusdprr9pqcpvkl").is_some());
        assert!(Address::parse(&main, "not-an-address").is_none());
    }

    #[test]
    fn bitcoin_cash_accepts_legacy_only() {
        let bch = network("bitcoincash-mainnet");
        assert!(Address::parse(&bch, "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2").is_some());
        assert!(Address::parse(&bch, "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu").is_none());
    }

    #[test]
    fn ethereum_checksum() {
        let eth = network("ethereum-mainnet");
        // EIP-55 reference vector
        let canonical = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
        let parsed = Address::parse(&eth, &canonical.to_lowercase()).unwrap();
        assert_eq!(parsed.as_str(), canonical);
        assert!(Address::parse(&eth, canonical).is_some());
        assert!(Address::parse(&eth, "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_none());
        assert!(Address::parse(&eth, "0x1234").is_none());
        assert!(!parsed.is_for(&network("bitcoin-mainnet")));
    }
}
