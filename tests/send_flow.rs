//! Session-level tests for the send workflow: the fee feedback loop, the
//! send pipeline, payment requests and URI handling, all against the mock
//! chain backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use centavo::send::pipeline::{SendAttempt, spawn_sign_and_broadcast};
use centavo::{
    FeeUpdateOutcome, Network, SendError, SessionManager, SessionNotice, UserPrompts, WalletStatus,
};
use centavo_sdk::testing::MockBackend;
use centavo_sdk::{
    Address, OutPoint, OutputValue, PaymentRequest, PrOutput, Txid, UnspentEntry,
};
use tokio::sync::mpsc::unbounded_channel;

const MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

struct AutoConfirm {
    confirmations: AtomicUsize,
}

impl AutoConfirm {
    fn new() -> Arc<Self> {
        Arc::new(AutoConfirm {
            confirmations: AtomicUsize::new(0),
        })
    }
}

impl UserPrompts for AutoConfirm {
    fn confirm(&self, _message: &str) -> bool {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn password(&self, _message: &str) -> Option<String> {
        Some("pw".to_string())
    }
}

struct RefuseAll;

impl UserPrompts for RefuseAll {
    fn confirm(&self, _message: &str) -> bool {
        false
    }

    fn password(&self, _message: &str) -> Option<String> {
        None
    }
}

struct Fixture {
    manager: SessionManager,
    backend: Arc<MockBackend>,
    prompts: Arc<AutoConfirm>,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let prompts = AutoConfirm::new();
    let manager = SessionManager::new(
        dir.path(),
        Network::Regtest,
        backend.clone(),
        prompts.clone(),
        None,
    );
    Fixture {
        manager,
        backend,
        prompts,
        _dir: dir,
    }
}

fn fund(fixture: &mut Fixture, index: usize, tag: u8, value: u64, height: i32) {
    let address = fixture
        .manager
        .wallet()
        .receiving_address(index)
        .expect("derived address");
    fixture.backend.add_utxo(
        &address.to_script(),
        UnspentEntry {
            outpoint: OutPoint::new(Txid::from_wire_bytes([tag; 32]), 0),
            value,
            height,
        },
    );
}

fn payee_str(tag: u8) -> String {
    Address::p2pkh([tag; 20]).to_cashaddr(Network::Regtest)
}

fn setup_funded(values: &[u64]) -> Fixture {
    let mut fixture = fixture();
    fixture
        .manager
        .wallet_mut()
        .restore_wallet(MNEMONIC, "pw")
        .unwrap();
    for (i, value) in values.iter().enumerate() {
        fund(&mut fixture, 0, (i + 1) as u8, *value, 100);
    }
    fixture.manager.wallet_mut().sync().unwrap();
    fixture
}

// ── fee feedback loop ───────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn fee_updates_are_coalesced_into_tick() {
    let mut fixture = setup_funded(&[50_000]);
    let payee = payee_str(0xee);
    {
        let (send, _wallet, contacts, _invoices) = fixture.manager.send_mut();
        send.set_payto_text(&payee, contacts);
        send.set_amount_text("10");
        send.set_amount_text("100");
        send.set_amount_text("100.50");
    }

    let _ = fixture.manager.tick();
    let send = fixture.manager.send();
    // Last edit wins: the displayed fee corresponds to the final amount.
    let fee = send.displayed_fee().expect("fee computed");
    assert!(fee > 0);
    assert!(send.status().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn fee_recompute_is_idempotent() {
    let mut fixture = setup_funded(&[50_000]);
    let payee = payee_str(0xee);
    let (send, wallet, contacts, _invoices) = fixture.manager.send_mut();

    send.set_payto_text(&payee, contacts);
    send.set_amount_text("100");
    let first = send.do_update_fee(wallet);
    let second = send.do_update_fee(wallet);
    assert_eq!(first, second);
    assert!(matches!(first, FeeUpdateOutcome::Ready { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn not_enough_funds_reports_frozen_balance() {
    let mut fixture = setup_funded(&[5_000, 3_000]);
    let frozen_addr = fixture.manager.wallet().receiving_address(0).unwrap();
    fixture.manager.wallet_mut().set_frozen(frozen_addr, true);

    let payee = payee_str(0xee);
    let (send, wallet, contacts, _invoices) = fixture.manager.send_mut();
    send.set_payto_text(&payee, contacts);
    // Both coins sit on the frozen address, so nothing is spendable.
    send.set_amount_text("10");
    let outcome = send.do_update_fee(wallet);
    assert_eq!(outcome, FeeUpdateOutcome::NotEnoughFunds);
    assert!(send.not_enough_funds());
    assert!(send.status().contains("Not enough funds"));
    assert!(send.status().contains("frozen"));
    assert!(send.displayed_fee().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn manual_fee_survives_not_enough_funds() {
    let mut fixture = setup_funded(&[2_000]);
    let payee = payee_str(0xee);
    let (send, wallet, contacts, _invoices) = fixture.manager.send_mut();

    send.set_payto_text(&payee, contacts);
    send.set_amount_text("100"); // 10_000 sats, more than funded
    send.set_manual_fee(Some(300));
    let outcome = send.do_update_fee(wallet);
    assert_eq!(outcome, FeeUpdateOutcome::NotEnoughFunds);
    // The frozen fee field keeps the user's value.
    assert_eq!(send.displayed_fee(), Some(300));
}

#[tokio::test(flavor = "multi_thread")]
async fn oversize_opreturn_is_a_distinct_state() {
    let mut fixture = setup_funded(&[50_000]);
    let mut config = fixture.manager.config().clone();
    config.enable_opreturn = true;
    fixture.manager.set_config(config);

    let payee = payee_str(0xee);
    let (send, wallet, contacts, _invoices) = fixture.manager.send_mut();
    send.set_payto_text(&payee, contacts);
    send.set_amount_text("10");
    send.set_op_return(&"x".repeat(221), false);
    let outcome = send.do_update_fee(wallet);
    assert_eq!(outcome, FeeUpdateOutcome::OpReturnTooLarge);
    assert!(send.op_return_toolong());
    assert!(send.status().contains("220"));

    // Exactly 220 bytes is fine.
    send.set_op_return(&"x".repeat(220), false);
    let outcome = send.do_update_fee(wallet);
    assert!(matches!(outcome, FeeUpdateOutcome::Ready { .. }));
    assert!(!send.op_return_toolong());
}

#[tokio::test(flavor = "multi_thread")]
async fn max_mode_writes_back_spendable_total() {
    let mut fixture = setup_funded(&[10_000]);
    let payee = payee_str(0xee);
    let (send, wallet, contacts, _invoices) = fixture.manager.send_mut();

    send.set_payto_text(&payee, contacts);
    send.spend_max();
    let outcome = send.do_update_fee(wallet);
    let FeeUpdateOutcome::Ready { fee, amount, .. } = outcome else {
        panic!("expected Ready, got {:?}", outcome);
    };
    assert_eq!(amount + fee, 10_000);
    assert_eq!(
        send.amount_text(),
        centavo_sdk::format_satoshis(amount, 2)
    );
}

// ── sending ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn simple_send_end_to_end() {
    let mut fixture = setup_funded(&[50_000]);
    let payee = payee_str(0xee);
    {
        let (send, wallet, contacts, _invoices) = fixture.manager.send_mut();
        send.set_payto_text(&payee, contacts);
        send.set_amount_text("100");
        send.set_message("coffee");
        send.do_update_fee(wallet);
        let handle = send.do_send(wallet).unwrap();
        handle.await.unwrap();
    }

    let notices = fixture.manager.tick();
    assert!(
        notices
            .iter()
            .any(|n| matches!(n, SessionNotice::PaymentSent { txid: Some(_), .. })),
        "expected a payment-sent notice, got {:?}",
        notices
    );
    assert_eq!(fixture.backend.broadcast_count(), 1);

    // The form reset to its initial state.
    let send = fixture.manager.send();
    assert!(send.payto_text().is_empty());
    assert!(send.amount_text().is_empty());
    assert!(send.displayed_fee().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn send_with_locked_wallet_uses_password_prompt() {
    let mut fixture = setup_funded(&[50_000]);
    fixture.manager.wallet_mut().lock();
    assert_eq!(fixture.manager.wallet().status(), WalletStatus::Locked);

    let payee = payee_str(0xee);
    let (send, wallet, contacts, _invoices) = fixture.manager.send_mut();
    send.set_payto_text(&payee, contacts);
    send.set_amount_text("100");
    let handle = send.do_send(wallet).unwrap();
    handle.await.unwrap();
    assert_eq!(wallet.status(), WalletStatus::Unlocked);
    assert_eq!(fixture.backend.broadcast_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_confirmation_aborts_before_broadcast() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let mut manager = SessionManager::new(
        dir.path(),
        Network::Regtest,
        backend.clone(),
        Arc::new(RefuseAll),
        None,
    );
    manager.wallet_mut().restore_wallet(MNEMONIC, "pw").unwrap();
    let address = manager.wallet().receiving_address(0).unwrap();
    backend.add_utxo(
        &address.to_script(),
        UnspentEntry {
            outpoint: OutPoint::new(Txid::from_wire_bytes([1; 32]), 0),
            value: 50_000,
            height: 100,
        },
    );
    manager.wallet_mut().sync().unwrap();

    let payee = payee_str(0xee);
    let (send, wallet, contacts, _invoices) = manager.send_mut();
    send.set_payto_text(&payee, contacts);
    send.set_amount_text("100");
    let err = send.do_send(wallet).unwrap_err();
    assert!(matches!(err, SendError::Cancelled));
    assert_eq!(backend.broadcast_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_lines_block_sending() {
    let mut fixture = setup_funded(&[50_000]);
    let text = format!("{}, 10\nnot an address, 5", payee_str(0xee));
    let (send, wallet, contacts, _invoices) = fixture.manager.send_mut();
    send.set_payto_text(&text, contacts);
    let err = send.do_send(wallet).unwrap_err();
    match err {
        SendError::InvalidLines(lines) => assert!(lines.contains("Line #2")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fixture.backend.broadcast_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn opreturn_only_send_needs_no_payee() {
    let mut fixture = setup_funded(&[50_000]);
    let mut config = fixture.manager.config().clone();
    config.enable_opreturn = true;
    fixture.manager.set_config(config);

    let (send, wallet, _contacts, _invoices) = fixture.manager.send_mut();
    send.set_op_return("memo on chain", false);
    let handle = send.do_send(wallet).unwrap();
    handle.await.unwrap();
    assert_eq!(fixture.backend.broadcast_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn no_outputs_is_an_error() {
    let mut fixture = setup_funded(&[50_000]);
    let (send, wallet, _contacts, _invoices) = fixture.manager.send_mut();
    let err = send.do_send(wallet).unwrap_err();
    assert!(matches!(err, SendError::NoOutputs));
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnected_backend_refuses_to_send() {
    let mut fixture = setup_funded(&[50_000]);
    fixture.backend.set_connected(false);
    let payee = payee_str(0xee);
    let (send, wallet, contacts, _invoices) = fixture.manager.send_mut();
    send.set_payto_text(&payee, contacts);
    send.set_amount_text("100");
    let err = send.do_send(wallet).unwrap_err();
    assert!(matches!(err, SendError::NotConnected));
}

// ── payment requests ────────────────────────────────────────────────────

fn payment_request(expires: Option<i64>) -> PaymentRequest {
    PaymentRequest {
        outputs: vec![PrOutput {
            address: payee_str(0x77),
            amount: 5_000,
        }],
        expires,
        memo: "invoice memo".to_string(),
        payment_url: None,
        requestor: Some("merchant.example".to_string()),
        id: "pr-42".to_string(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn payment_request_takes_over_the_form() {
    let mut fixture = setup_funded(&[50_000]);
    let (send, _wallet, _contacts, invoices) = fixture.manager.send_mut();
    let notices = send.on_payment_request(payment_request(None), invoices);
    assert!(notices.is_empty(), "unexpected notices: {:?}", notices);
    assert_eq!(send.payto_text(), "merchant.example");
    assert_eq!(send.amount_text(), "50"); // 5000 sats at 2 decimals
    assert!(send.payto_frozen());
    assert!(send.payment_request().is_some());
    assert_eq!(invoices.unpaid_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_request_blocks_send_at_form_read() {
    let mut fixture = setup_funded(&[50_000]);
    let (send, wallet, _contacts, invoices) = fixture.manager.send_mut();
    send.on_payment_request(payment_request(Some(1_000_000)), invoices);
    let err = send.do_send(wallet).unwrap_err();
    assert!(matches!(err, SendError::PaymentRequestExpired));
    assert_eq!(fixture.backend.broadcast_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_request_at_broadcast_time_makes_no_network_call() {
    // Drive the pipeline directly with a request that expired between
    // confirmation and broadcast.
    let mut fixture = setup_funded(&[50_000]);
    let wallet = fixture.manager.wallet();
    let coins = wallet.get_spendable_coins(None, false);
    let outputs = [centavo_sdk::Output {
        destination: centavo_sdk::Destination::Address(Address::p2pkh([0xee; 20])),
        value: OutputValue::Sats(1_000),
    }];
    let tx = wallet
        .make_unsigned_transaction(&coins, &outputs, centavo_sdk::FeePolicy::CustomRate(1000), false)
        .unwrap();
    let signer = wallet.signer_handle().unwrap();

    let (events_tx, mut events_rx) = unbounded_channel();
    let handle = spawn_sign_and_broadcast(
        SendAttempt {
            tx,
            label: None,
            warned_low_fee: true,
            pr_key: Some("pr-42".to_string()),
        },
        signer,
        fixture.backend.clone(),
        Some(payment_request(Some(1_000_000))),
        Some(payee_str(0x11)),
        reqwest::Client::new(),
        fixture.prompts.clone(),
        events_tx,
    );
    handle.await.unwrap();

    assert_eq!(fixture.backend.broadcast_count(), 0, "no network call");
    let mut saw_expired = false;
    let mut saw_failed_broadcast = false;
    while let Ok(event) = events_rx.try_recv() {
        match event {
            centavo::SessionEvent::PaymentRequestExpired => saw_expired = true,
            centavo::SessionEvent::BroadcastDone { ok, message, .. } => {
                assert!(!ok);
                assert_eq!(message, "Payment request has expired");
                saw_failed_broadcast = true;
            }
            _ => {}
        }
    }
    assert!(saw_expired && saw_failed_broadcast);
}

#[tokio::test(flavor = "multi_thread")]
async fn broadcast_failure_surfaces_as_error_notice() {
    let mut fixture = setup_funded(&[50_000]);
    fixture.backend.set_fail_broadcast(true);
    let payee = payee_str(0xee);
    {
        let (send, wallet, contacts, _invoices) = fixture.manager.send_mut();
        send.set_payto_text(&payee, contacts);
        send.set_amount_text("100");
        let handle = send.do_send(wallet).unwrap();
        handle.await.unwrap();
    }
    let notices = fixture.manager.tick();
    assert!(
        notices
            .iter()
            .any(|n| matches!(n, SessionNotice::Error(msg) if msg.contains("mock broadcast"))),
        "got {:?}",
        notices
    );
}

// ── URIs ────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn uri_populates_payee_amount_and_opreturn() {
    let mut fixture = setup_funded(&[50_000]);
    let body = payee_str(0x55);
    let body = body.split(':').nth(1).unwrap();
    let uri = format!("ecregtest:{}?amount=12.34&op_return=hello", body);

    let (send, _wallet, contacts, _invoices) = fixture.manager.send_mut();
    let warnings = send.pay_to_uri(&uri, contacts).unwrap();
    assert!(warnings.is_empty());
    assert_eq!(send.payto_text(), payee_str(0x55));
    assert_eq!(send.amount_text(), "12.34");
    assert_eq!(send.op_return_text(), "hello");
    assert!(!send.op_return_raw());
}

#[tokio::test(flavor = "multi_thread")]
async fn uri_with_mismatched_lists_is_rejected() {
    let mut fixture = setup_funded(&[50_000]);
    let a = payee_str(0x55);
    let b = payee_str(0x66);
    let uri = format!(
        "ecregtest:?addresses={},{}&amounts=10",
        a.split(':').nth(1).unwrap(),
        b.split(':').nth(1).unwrap()
    );
    let (send, _wallet, contacts, _invoices) = fixture.manager.send_mut();
    let err = send.pay_to_uri(&uri, contacts).unwrap_err();
    assert!(matches!(
        err,
        SendError::InconsistentUri {
            addresses: 2,
            amounts: 1
        }
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn uri_pay_to_many_fills_csv_lines() {
    let mut fixture = setup_funded(&[500_000]);
    let a = payee_str(0x55);
    let b = payee_str(0x66);
    let uri = format!(
        "ecregtest:?addresses={},{}&amounts=10,20",
        a.split(':').nth(1).unwrap(),
        b.split(':').nth(1).unwrap()
    );
    let (send, wallet, contacts, _invoices) = fixture.manager.send_mut();
    send.pay_to_uri(&uri, contacts).unwrap();
    assert_eq!(send.payto_text().lines().count(), 2);
    let outcome = send.do_update_fee(wallet);
    assert!(matches!(outcome, FeeUpdateOutcome::Ready { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn uri_extra_params_warn_but_do_not_fail() {
    let mut fixture = setup_funded(&[50_000]);
    let body = payee_str(0x55);
    let uri = format!(
        "ecregtest:{}?amount=1&unknownparam=zzz",
        body.split(':').nth(1).unwrap()
    );
    let (send, _wallet, contacts, _invoices) = fixture.manager.send_mut();
    let warnings = send.pay_to_uri(&uri, contacts).unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("unknownparam"));
}

#[tokio::test(flavor = "multi_thread")]
async fn large_uri_amount_adds_a_warning() {
    let mut fixture = setup_funded(&[50_000]);
    let body = payee_str(0x55);
    let uri = format!(
        "ecregtest:{}?amount=4000000",
        body.split(':').nth(1).unwrap()
    );
    let (send, _wallet, contacts, _invoices) = fixture.manager.send_mut();
    let warnings = send.pay_to_uri(&uri, contacts).unwrap();
    assert!(warnings.iter().any(|w| w.contains("check the amount")));
}

// ── alias resolution ────────────────────────────────────────────────────

struct StaticResolver {
    record: centavo::AliasRecord,
}

impl centavo::AliasResolver for StaticResolver {
    fn resolve(&self, name: &str) -> Option<centavo::AliasRecord> {
        (name == self.record.name).then(|| self.record.clone())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn alias_resolution_rewrites_and_freezes_the_field() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let resolver = Arc::new(StaticResolver {
        record: centavo::AliasRecord {
            name: "pay.example".to_string(),
            address: payee_str(0x31),
            validated: true,
            openalias: false,
        },
    });
    let mut manager = SessionManager::new(
        dir.path(),
        Network::Regtest,
        backend,
        AutoConfirm::new(),
        Some(resolver),
    );
    manager.wallet_mut().restore_wallet(MNEMONIC, "pw").unwrap();

    {
        let (send, _wallet, contacts, _invoices) = manager.send_mut();
        send.set_payto_text("pay.example", contacts);
    }
    // First tick kicks off the lookup; the completion lands on a later one.
    manager.tick();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    manager.tick();

    let send = manager.send();
    assert_eq!(
        send.payto_text(),
        format!("pay.example <{}>", payee_str(0x31))
    );
    assert!(send.payto_frozen());
    assert!(send.resolved_alias().unwrap().validated);
    assert!(manager.contacts().get("pay.example").is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_alias_resolution_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let resolver = Arc::new(StaticResolver {
        record: centavo::AliasRecord {
            name: "other.example".to_string(),
            address: payee_str(0x31),
            validated: true,
            openalias: false,
        },
    });
    let mut manager = SessionManager::new(
        dir.path(),
        Network::Regtest,
        backend,
        AutoConfirm::new(),
        Some(resolver),
    );
    manager.wallet_mut().restore_wallet(MNEMONIC, "pw").unwrap();

    {
        let (send, _wallet, contacts, _invoices) = manager.send_mut();
        send.set_payto_text("unknown.example", contacts);
    }
    manager.tick();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let notices = manager.tick();
    assert!(notices.is_empty());
    assert_eq!(manager.send().payto_text(), "unknown.example");
    assert!(!manager.send().payto_frozen());
}
