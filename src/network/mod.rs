//! Networks - static catalog of chains the engine knows how to track.
//!
//! A `Network` is created once per chain/environment pair when the `System`
//! starts and is immutable afterwards. Every manager on that chain shares it.
//!
//! | uids | Type | Currencies |
//! |------|------|------------|
//! | `bitcoin-mainnet` / `bitcoin-testnet` | Bitcoin | btc |
//! | `bitcoincash-mainnet` / `bitcoincash-testnet` | BitcoinCash | bch |
//! | `ethereum-mainnet` / `ethereum-ropsten` | Ethereum | eth, brd (erc20) |

pub(crate) mod address;
mod catalog;
mod fee;

pub use address::Address;
pub use fee::{FeeBasis, NetworkFee};

use crate::currency::{Currency, Unit};
use crate::manager::WalletManagerMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Bitcoin,
    BitcoinCash,
    Ethereum,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Bitcoin => "bitcoin",
            NetworkType::BitcoinCash => "bitcoincash",
            NetworkType::Ethereum => "ethereum",
        }
    }
}

/// Currency on a network together with its units.
struct Association {
    currency: Currency,
    base_unit: Unit,
    default_unit: Unit,
    units: Vec<Unit>,
    /// Typical cost of one transfer (kB for bitcoin, gas for ethereum)
    cost_factor: f64,
}

#[derive(Clone)]
pub struct Network {
    inner: Arc<NetworkInner>,
}

struct NetworkInner {
    uids: String,
    name: String,
    type_: NetworkType,
    is_mainnet: bool,
    currency: Currency,
    associations: Vec<Association>,
    confirmations_until_final: u32,
    fee: NetworkFee,
    modes: Vec<WalletManagerMode>,
    default_mode: WalletManagerMode,
}

impl Network {
    /// Every network of the requested environment.
    pub fn catalog(mainnet: bool) -> Vec<Network> { catalog::build(mainnet) }

    pub fn uids(&self) -> &str { &self.inner.uids }
    pub fn name(&self) -> &str { &self.inner.name }
    pub fn type_(&self) -> NetworkType { self.inner.type_ }
    pub fn is_mainnet(&self) -> bool { self.inner.is_mainnet }
    /// Native currency, the one fees are paid in.
    pub fn currency(&self) -> &Currency { &self.inner.currency }
    pub fn confirmations_until_final(&self) -> u32 { self.inner.confirmations_until_final }
    pub fn fee(&self) -> &NetworkFee { &self.inner.fee }
    pub fn modes(&self) -> &[WalletManagerMode] { &self.inner.modes }
    pub fn default_mode(&self) -> WalletManagerMode { self.inner.default_mode }
    pub fn supports_mode(&self, mode: WalletManagerMode) -> bool { self.inner.modes.contains(&mode) }

    pub fn currencies(&self) -> Vec<Currency> {
        self.inner.associations.iter().map(|a| a.currency.clone()).collect()
    }

    pub fn has_currency(&self, currency: &Currency) -> bool { self.association(currency).is_some() }

    pub fn currency_by_code(&self, code: &str) -> Option<Currency> {
        self.inner.associations.iter().find(|a| a.currency.code() == code).map(|a| a.currency.clone())
    }

    pub fn currency_by_uids(&self, uids: &str) -> Option<Currency> {
        self.inner.associations.iter().find(|a| a.currency.uids() == uids).map(|a| a.currency.clone())
    }

    pub fn base_unit(&self, currency: &Currency) -> Option<Unit> {
        self.association(currency).map(|a| a.base_unit.clone())
    }

    pub fn default_unit(&self, currency: &Currency) -> Option<Unit> {
        self.association(currency).map(|a| a.default_unit.clone())
    }

    pub fn units(&self, currency: &Currency) -> Vec<Unit> {
        self.association(currency).map(|a| a.units.clone()).unwrap_or_default()
    }

    /// Unit fees are charged in: the base unit of the native currency.
    pub fn fee_unit(&self) -> Unit { self.inner.fee.price_per_cost_factor().unit().clone() }

    pub fn cost_factor(&self, currency: &Currency) -> Option<f64> { self.association(currency).map(|a| a.cost_factor) }

    /// Default fee basis for transfers of `currency` at the network's fee rate.
    pub fn default_fee_basis(&self, currency: &Currency) -> Option<FeeBasis> {
        FeeBasis::new(self.inner.fee.price_per_cost_factor().clone(), self.cost_factor(currency)?)
    }

    fn association(&self, currency: &Currency) -> Option<&Association> {
        self.inner.associations.iter().find(|a| a.currency == *currency)
    }
}

impl PartialEq for Network {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }
}
impl Eq for Network {}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network").field("uids", &self.inner.uids).finish()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.inner.uids) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_splits_by_environment() {
        let main = Network::catalog(true);
        let test = Network::catalog(false);
        assert!(main.iter().all(|n| n.is_mainnet()));
        assert!(test.iter().all(|n| !n.is_mainnet()));
        assert_eq!(main.len(), test.len());
        assert!(main.iter().any(|n| n.uids() == "bitcoin-mainnet"));
        assert!(test.iter().any(|n| n.uids() == "ethereum-ropsten"));
    }

    #[test]
    fn every_currency_has_one_base_unit() {
        for network in Network::catalog(true) {
            for currency in network.currencies() {
                let base = network.base_unit(&currency).expect("base");
                assert!(base.is_base());
                for unit in network.units(&currency) {
                    assert_eq!(unit.base(), base);
                    assert!(unit.has_currency(&currency));
                }
                let default = network.default_unit(&currency).expect("default");
                assert!(default.is_compatible(&base));
            }
        }
    }

    #[test]
    fn ethereum_carries_token() {
        let eth = Network::catalog(true).into_iter().find(|n| n.type_() == NetworkType::Ethereum).unwrap();
        let brd = eth.currency_by_code("brd").expect("brd");
        assert_eq!(brd.type_(), "erc20");
        assert!(brd.issuer().is_some());
        assert_eq!(eth.currency_by_uids(brd.uids()), Some(brd.clone()));
        // Token fees are paid in ether
        let fee = eth.default_fee_basis(&brd).unwrap().fee().unwrap();
        assert!(fee.unit().has_currency(eth.currency()));
    }
}
