use crate::manager::{WalletManager, WalletManagerEvent};
use crate::network::Network;
use crate::transfer::{Transfer, TransferEvent};
use crate::wallet::{Wallet, WalletEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    Created,
}

/// Receives every event of a `System`, one call at a time, on the
/// `walletcore-listener` thread. Events of one entity arrive in the order the
/// changes happened.
///
/// The System only holds the listener weakly; keep your `Arc` alive for as
/// long as you want callbacks.
pub trait SystemListener: Send + Sync {
    fn handle_network_event(&self, network: &Network, event: NetworkEvent);
    fn handle_manager_event(&self, manager: &WalletManager, event: WalletManagerEvent);
    fn handle_wallet_event(&self, manager: &WalletManager, wallet: &Wallet, event: WalletEvent);
    fn handle_transfer_event(&self, manager: &WalletManager, wallet: &Wallet, transfer: &Transfer, event: TransferEvent);
}

/// A computed event waiting for delivery.
pub(crate) enum ListenerEvent {
    Network(Network, NetworkEvent),
    Manager(WalletManager, WalletManagerEvent),
    Wallet(WalletManager, Wallet, WalletEvent),
    Transfer(WalletManager, Wallet, Transfer, TransferEvent),
}

impl ListenerEvent {
    pub(crate) fn deliver(self, listener: &dyn SystemListener) {
        match self {
            ListenerEvent::Network(network, event) => listener.handle_network_event(&network, event),
            ListenerEvent::Manager(manager, event) => listener.handle_manager_event(&manager, event),
            ListenerEvent::Wallet(manager, wallet, event) => listener.handle_wallet_event(&manager, &wallet, event),
            ListenerEvent::Transfer(manager, wallet, transfer, event) => {
                listener.handle_transfer_event(&manager, &wallet, &transfer, event)
            }
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ListenerEvent::Network(..) => "network",
            ListenerEvent::Manager(..) => "manager",
            ListenerEvent::Wallet(..) => "wallet",
            ListenerEvent::Transfer(..) => "transfer",
        }
    }
}
