//! Built-in network definitions.

use super::{Association, Network, NetworkFee, NetworkInner, NetworkType};
use crate::currency::{Amount, Currency, Unit};
use crate::manager::WalletManagerMode;
use std::sync::Arc;
use std::time::Duration;

const BRD_MAINNET: &str = "0x558ec3152e2eb2174905cd19aea4e34a23de9ad6";
const BRD_TESTNET: &str = "0x7108ca7c4718efa810457f228305c9c71390931a";

const ALL_MODES: &[WalletManagerMode] = &[WalletManagerMode::ApiOnly, WalletManagerMode::P2pOnly, WalletManagerMode::Hybrid];

pub(super) fn build(mainnet: bool) -> Vec<Network> {
    vec![bitcoin(mainnet), bitcoin_cash(mainnet), ethereum(mainnet)]
}

/// Satoshi-denominated chains share the same unit ladder.
fn satoshi_association(uids: &str, name: &str, code: &str, symbol: &str) -> Association {
    let currency = Currency::create(uids, name, code, "native", None);
    let sat = Unit::create_as_base(&currency, &format!("{}:sat", code), "Satoshi", "sat");
    let mcoin = Unit::create(&currency, &format!("{}:m{}", code, code), &format!("Milli{}", name), &format!("m{}", symbol), &sat, 5);
    let coin = Unit::create(&currency, &format!("{}:{}", code, code), name, symbol, &sat, 8);
    Association {
        currency,
        base_unit: sat.clone(),
        default_unit: coin.clone(),
        units: vec![sat, mcoin, coin],
        cost_factor: 0.25,
    }
}

fn bitcoin(mainnet: bool) -> Network {
    let uids = if mainnet { "bitcoin-mainnet" } else { "bitcoin-testnet" };
    let association = satoshi_association(&format!("{}:__native__", uids), "Bitcoin", "btc", "₿");
    let fee = NetworkFee::new(Amount::from_base(30_000, false, &association.base_unit), Duration::from_secs(30 * 60));
    network(uids, "Bitcoin", NetworkType::Bitcoin, mainnet, vec![association], 6, fee, WalletManagerMode::P2pOnly)
}

fn bitcoin_cash(mainnet: bool) -> Network {
    let uids = if mainnet { "bitcoincash-mainnet" } else { "bitcoincash-testnet" };
    let association = satoshi_association(&format!("{}:__native__", uids), "Bitcoin Cash", "bch", "BCH");
    let fee = NetworkFee::new(Amount::from_base(1_000, false, &association.base_unit), Duration::from_secs(60 * 60));
    network(uids, "Bitcoin Cash", NetworkType::BitcoinCash, mainnet, vec![association], 6, fee, WalletManagerMode::P2pOnly)
}

fn ethereum(mainnet: bool) -> Network {
    let uids = if mainnet { "ethereum-mainnet" } else { "ethereum-ropsten" };

    let eth = Currency::create(&format!("{}:__native__", uids), "Ethereum", "eth", "native", None);
    let wei = Unit::create_as_base(&eth, "eth:wei", "Wei", "wei");
    let gwei = Unit::create(&eth, "eth:gwei", "Gwei", "gwei", &wei, 9);
    let ether = Unit::create(&eth, "eth:ether", "Ether", "Ξ", &wei, 18);
    let ether_association = Association {
        currency: eth,
        base_unit: wei.clone(),
        default_unit: ether.clone(),
        units: vec![wei.clone(), gwei, ether],
        cost_factor: 21_000.0,
    };

    let issuer = if mainnet { BRD_MAINNET } else { BRD_TESTNET };
    let brd = Currency::create(&format!("{}:{}", uids, issuer), "BRD Token", "brd", "erc20", Some(issuer));
    let brdi = Unit::create_as_base(&brd, "brd:brdi", "BRD Token INT", "BRDI");
    let brd_unit = Unit::create(&brd, "brd:brd", "BRD Token", "BRD", &brdi, 18);
    let brd_association = Association {
        currency: brd,
        base_unit: brdi.clone(),
        default_unit: brd_unit.clone(),
        units: vec![brdi, brd_unit],
        cost_factor: 92_000.0,
    };

    // 20 gwei
    let fee = NetworkFee::new(Amount::from_base(20_000_000_000, false, &wei), Duration::from_secs(60));
    network(
        uids,
        "Ethereum",
        NetworkType::Ethereum,
        mainnet,
        vec![ether_association, brd_association],
        6,
        fee,
        WalletManagerMode::ApiOnly,
    )
}

#[allow(clippy::too_many_arguments)]
fn network(
    uids: &str,
    name: &str,
    type_: NetworkType,
    is_mainnet: bool,
    associations: Vec<Association>,
    confirmations_until_final: u32,
    fee: NetworkFee,
    default_mode: WalletManagerMode,
) -> Network {
    let currency = associations[0].currency.clone();
    Network {
        inner: Arc::new(NetworkInner {
            uids: uids.into(),
            name: name.into(),
            type_,
            is_mainnet,
            currency,
            associations,
            confirmations_until_final,
            fee,
            modes: ALL_MODES.to_vec(),
            default_mode,
        }),
    }
}
