//! Transfer Tests: creation, signing, submission and the per-transfer event chain

mod common;

use common::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use walletcore::{
    Address, Amount, Error, FeeBasis, System, TransferDirection, TransferEvent, TransferState, Unit, WalletEvent,
    WalletManager, WalletManagerMode, WalletManagerState,
};

struct Harness {
    _dir: TempDir,
    system: System,
    manager: WalletManager,
    listener: Arc<RecordingListener>,
    client: Arc<MockClient>,
    sat: Unit,
}

/// Bitcoin manager connected and past its first sync pass.
async fn connected() -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let listener = RecordingListener::new();
    let client = MockClient::new(100);
    let system = start_system(config(&dir), client.clone(), &listener).await;
    let btc = network(&system, "bitcoin-mainnet");
    let manager = system.create_wallet_manager(&btc, WalletManagerMode::ApiOnly).expect("manager");
    manager.connect().expect("connect");
    assert!(eventually(&system, || listener.sync_errors(manager.id()).len() == 1).await);
    let sat = btc.base_unit(btc.currency()).expect("sat");
    Harness { _dir: dir, system, manager, listener, client, sat }
}

fn sats(h: &Harness, value: i64) -> Amount {
    Amount::create_integer(value, &h.sat).expect("amount")
}

fn other(h: &Harness) -> Address {
    Address::parse(h.manager.network(), BTC_OTHER).expect("address")
}

/// Test: sign then submit walks the transfer forward with one event per step
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sign_and_submit_succeeds() {
    let _guard = lock_system();
    let h = connected().await;
    let wallet = h.manager.primary_wallet();

    let transfer = wallet.create_transfer(&other(&h), &sats(&h, 10_000), &wallet.default_fee_basis()).expect("create");
    assert_eq!(transfer.state(), TransferState::Created);
    assert_eq!(transfer.direction(), TransferDirection::Sent);
    assert_eq!(transfer.fee().map(|f| f.value()), Some(7_500));
    assert!(transfer.hash().is_none());

    h.manager.sign(&transfer, TEST_MNEMONIC).expect("sign");
    assert_eq!(transfer.state(), TransferState::Signed);
    assert!(transfer.is_signed());
    let hash = transfer.hash().expect("hash");
    assert_eq!(hash.len(), 64);

    h.manager.submit(&transfer).expect("submit");
    assert!(eventually(&h.system, || h.listener.submissions(wallet.id(), &transfer) == vec![true]).await);
    assert_eq!(transfer.state(), TransferState::Submitted);

    assert_eq!(
        h.listener.transfer_events(transfer.id()),
        vec![
            TransferEvent::Created,
            TransferEvent::Changed { old: TransferState::Created, new: TransferState::Signed },
            TransferEvent::Changed { old: TransferState::Signed, new: TransferState::Submitted },
        ]
    );

    let balance = wallet.balance();
    assert!(balance.is_negative());
    assert_eq!(balance.value(), 17_500);

    let submitted = h.client.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].hash, hash);
    assert_eq!(submitted[0].target, BTC_OTHER);
    assert_eq!(submitted[0].amount, 10_000);
    assert_eq!(submitted[0].fee, 7_500);
    assert!(!submitted[0].signature.is_empty());
}

/// Test: a rejected submission fails the transfer and leaves the balance alone
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_submission_fails_transfer() {
    let _guard = lock_system();
    let h = connected().await;
    h.client.reject_submit(Some("insufficient funds"));
    let wallet = h.manager.primary_wallet();

    let transfer = wallet.create_transfer(&other(&h), &sats(&h, 5_000), &wallet.default_fee_basis()).expect("create");
    h.manager.sign_and_submit(&transfer, TEST_MNEMONIC).expect("sign and submit");
    assert!(eventually(&h.system, || h.listener.submissions(wallet.id(), &transfer) == vec![false]).await);

    assert_eq!(transfer.state(), TransferState::Failed("insufficient funds".into()));
    assert!(wallet.balance().is_zero());
    assert_eq!(
        h.listener.transfer_changes(transfer.id()),
        vec![
            (TransferState::Created, TransferState::Signed),
            (TransferState::Signed, TransferState::Failed("insufficient funds".into())),
        ]
    );
    assert!(matches!(h.manager.submit(&transfer), Err(Error::InvalidTransferState { .. })));
}

/// Test: signing needs the account's phrase and a Created transfer
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn signing_is_guarded() {
    let _guard = lock_system();
    let h = connected().await;
    let wallet = h.manager.primary_wallet();
    let transfer = wallet.create_transfer(&other(&h), &sats(&h, 1_000), &wallet.default_fee_basis()).expect("create");

    assert!(matches!(h.manager.submit(&transfer), Err(Error::InvalidTransferState { .. })));
    assert!(matches!(h.manager.sign(&transfer, OTHER_MNEMONIC), Err(Error::AccountMismatch(_))));
    assert!(matches!(h.manager.sign(&transfer, "not a phrase"), Err(Error::InvalidPhrase(_))));
    assert_eq!(transfer.state(), TransferState::Created);

    h.manager.sign(&transfer, TEST_MNEMONIC).expect("sign");
    assert!(matches!(h.manager.sign(&transfer, TEST_MNEMONIC), Err(Error::InvalidTransferState { .. })));
}

/// Test: sign_and_submit changes nothing when signing fails or the manager is idle
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sign_and_submit_is_atomic() {
    let _guard = lock_system();
    let h = connected().await;
    let wallet = h.manager.primary_wallet();
    let transfer = wallet.create_transfer(&other(&h), &sats(&h, 1_000), &wallet.default_fee_basis()).expect("create");

    assert!(matches!(h.manager.sign_and_submit(&transfer, OTHER_MNEMONIC), Err(Error::AccountMismatch(_))));
    h.manager.disconnect().expect("disconnect");
    assert!(matches!(
        h.manager.sign_and_submit(&transfer, TEST_MNEMONIC),
        Err(Error::InvalidManagerState { .. })
    ));

    h.system.flush().await;
    assert_eq!(transfer.state(), TransferState::Created);
    assert!(!transfer.is_signed());
    assert_eq!(h.listener.transfer_events(transfer.id()), vec![TransferEvent::Created]);
    assert!(h.client.submitted().is_empty());
}

/// Test: a submission still in flight at disconnect fails instead of staying Signed
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_fails_pending_submission() {
    let _guard = lock_system();
    let h = connected().await;
    h.client.hold_submit(true);
    let wallet = h.manager.primary_wallet();
    let transfer = wallet.create_transfer(&other(&h), &sats(&h, 2_000), &wallet.default_fee_basis()).expect("create");

    h.manager.sign_and_submit(&transfer, TEST_MNEMONIC).expect("sign and submit");
    h.manager.disconnect().expect("disconnect");
    // Settled before disconnect returns
    assert_eq!(transfer.state(), TransferState::Failed("submission cancelled".into()));

    h.client.release();
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.manager.connect().expect("reconnect");
    assert!(eventually(&h.system, || reconnected(&h)).await);

    assert_eq!(transfer.state(), TransferState::Failed("submission cancelled".into()));
    assert!(wallet.balance().is_zero());
    assert_eq!(h.listener.submissions(wallet.id(), &transfer), vec![false]);
    assert_eq!(
        h.listener.transfer_changes(transfer.id()),
        vec![
            (TransferState::Created, TransferState::Signed),
            (TransferState::Signed, TransferState::Failed("submission cancelled".into())),
        ]
    );
    assert!(matches!(h.manager.submit(&transfer), Err(Error::InvalidTransferState { .. })));
}

fn reconnected(h: &Harness) -> bool {
    h.listener
        .manager_changes(h.manager.id())
        .iter()
        .filter(|(_, new)| *new == WalletManagerState::Connected)
        .count()
        >= 3
}

/// Test: a submitted transfer is confirmed by a later sync
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submitted_transfer_included_by_sync() {
    let _guard = lock_system();
    let h = connected().await;
    let wallet = h.manager.primary_wallet();
    let transfer = wallet.create_transfer(&other(&h), &sats(&h, 10_000), &wallet.default_fee_basis()).expect("create");
    h.manager.sign_and_submit(&transfer, TEST_MNEMONIC).expect("sign and submit");
    assert!(eventually(&h.system, || h.listener.submissions(wallet.id(), &transfer) == vec![true]).await);

    let hash = transfer.hash().expect("hash");
    h.client.set_height(101);
    h.client.add_record(btc_record(&hash, BTC_OWN, BTC_OTHER, 10_000, 7_000, Some(101)));
    h.manager.sync().expect("sync");
    assert!(eventually(&h.system, || h.listener.sync_errors(h.manager.id()).len() == 2).await);
    assert!(transfer.confirmation().is_some());

    assert_eq!(wallet.transfers().len(), 1);
    assert_eq!(transfer.confirmations(), Some(1));
    assert_eq!(transfer.fee().map(|f| f.value()), Some(7_000));
    assert_eq!(wallet.balance().value(), 17_000);
    let events = h.listener.transfer_events(transfer.id());
    assert!(matches!(
        events.last(),
        Some(TransferEvent::Changed { old: TransferState::Submitted, new: TransferState::Included(_) })
    ));
    let changes = h.listener.transfer_changes(transfer.id());
    assert_eq!(changes.len(), 3);
    assert_eq!(changes[0].0, TransferState::Created);
    assert_chained(&changes);
}

/// Test: removal deletes the transfer from its wallet with events
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remove_transfer_deletes() {
    let _guard = lock_system();
    let h = connected().await;
    let wallet = h.manager.primary_wallet();
    let transfer = wallet.create_transfer(&other(&h), &sats(&h, 3_000), &wallet.default_fee_basis()).expect("create");

    h.manager.remove_transfer(&transfer).expect("remove");
    h.system.flush().await;

    assert_eq!(transfer.state(), TransferState::Deleted);
    assert!(wallet.transfers().is_empty());
    assert!(h.system.lookup_transfer(&wallet, transfer.id()).is_none());
    assert_eq!(
        h.listener.transfer_events(transfer.id()),
        vec![
            TransferEvent::Created,
            TransferEvent::Changed { old: TransferState::Created, new: TransferState::Deleted },
            TransferEvent::Deleted,
        ]
    );
    assert!(h
        .listener
        .wallet_events(wallet.id())
        .contains(&WalletEvent::TransferDeleted { transfer: transfer.clone() }));
    assert!(matches!(h.manager.remove_transfer(&transfer), Err(Error::Deleted(_))));
}

/// Test: creation validates target, amount and fee units
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_transfer_validates_inputs() {
    let _guard = lock_system();
    let h = connected().await;
    let wallet = h.manager.primary_wallet();
    let fee_basis = wallet.default_fee_basis();

    let eth = network(&h.system, "ethereum-mainnet");
    let eth_target = Address::parse(&eth, ETH_OTHER).expect("eth address");
    assert!(matches!(
        wallet.create_transfer(&eth_target, &sats(&h, 1_000), &fee_basis),
        Err(Error::InvalidAddress { .. })
    ));
    assert!(matches!(wallet.create_transfer(&other(&h), &sats(&h, 0), &fee_basis), Err(Error::InvalidAmount(_))));

    let wei = eth.base_unit(eth.currency()).expect("wei");
    let ether_amount = Amount::create_integer(1, &wei).expect("wei amount");
    assert!(matches!(
        wallet.create_transfer(&other(&h), &ether_amount, &fee_basis),
        Err(Error::IncompatibleUnit)
    ));
    let wei_fees = FeeBasis::new(Amount::create_integer(1, &wei).expect("price"), 21_000.0).expect("fee basis");
    assert!(matches!(
        wallet.create_transfer(&other(&h), &sats(&h, 1_000), &wei_fees),
        Err(Error::IncompatibleUnit)
    ));
    assert!(matches!(wallet.set_default_fee_basis(&wei_fees), Err(Error::IncompatibleUnit)));
    assert!(wallet.transfers().is_empty());
}

/// Test: sending to ourselves only costs the fee
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn self_transfer_is_recovered() {
    let _guard = lock_system();
    let h = connected().await;
    let wallet = h.manager.primary_wallet();
    let own = h.manager.address().clone();

    let cheap = FeeBasis::new(sats(&h, 4_000), 0.5).expect("fee basis");
    wallet.set_default_fee_basis(&cheap).expect("fee basis");
    assert_eq!(wallet.estimate_fee(&sats(&h, 1), &wallet.default_fee_basis()).expect("estimate").value(), 2_000);

    let transfer = wallet.create_transfer(&own, &sats(&h, 9_000), &wallet.default_fee_basis()).expect("create");
    assert_eq!(transfer.direction(), TransferDirection::Recovered);
    assert!(transfer.amount_directed().is_zero());

    h.manager.sign_and_submit(&transfer, TEST_MNEMONIC).expect("sign and submit");
    assert!(eventually(&h.system, || h.listener.submissions(wallet.id(), &transfer) == vec![true]).await);
    assert_eq!(transfer.state(), TransferState::Submitted);
    assert_eq!(wallet.balance().value(), 2_000);
    assert!(wallet.balance().is_negative());
    assert!(h
        .listener
        .wallet_events(wallet.id())
        .contains(&WalletEvent::FeeBasisUpdated { fee_basis: cheap }));
}

/// Test: concurrent creators never lose or duplicate transfers
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_creation_is_race_free() {
    let _guard = lock_system();
    let h = connected().await;
    let wallet = h.manager.primary_wallet();
    let target = other(&h);
    let amount = sats(&h, 100);

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let wallet = wallet.clone();
            let target = target.clone();
            let amount = amount.clone();
            std::thread::spawn(move || {
                (0..5)
                    .map(|_| wallet.create_transfer(&target, &amount, &wallet.default_fee_basis()).expect("create").id())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let ids: HashSet<_> = workers.into_iter().flat_map(|w| w.join().expect("worker")).collect();
    h.system.flush().await;

    assert_eq!(ids.len(), 40);
    assert_eq!(wallet.transfers().len(), 40);
    let added = h
        .listener
        .wallet_events(wallet.id())
        .into_iter()
        .filter(|e| matches!(e, WalletEvent::TransferAdded { .. }))
        .count();
    assert_eq!(added, 40);
    for id in ids {
        assert_eq!(h.listener.transfer_events(id), vec![TransferEvent::Created]);
    }
}
