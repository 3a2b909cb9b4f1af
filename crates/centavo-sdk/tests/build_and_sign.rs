//! End-to-end engine tests: parse recipients, select coins, build, sign,
//! serialize and broadcast against the mock chain backend.

use centavo_sdk::testing::{MockBackend, test_address, test_coin, test_signer};
use centavo_sdk::{
    Address, ChainBackend, Coin, Destination, FeePolicy, KeyBranch, Network, Output, OutputValue,
    make_unsigned_transaction, parse_payto,
};

fn change() -> [Address; 1] {
    [test_address(0xcc)]
}

#[test]
fn sign_and_broadcast_round_trip() {
    let mut signer = test_signer();
    let a0 = signer.derive(KeyBranch::Receiving, 0).unwrap();
    let a1 = signer.derive(KeyBranch::Receiving, 1).unwrap();
    let coins = [test_coin(1, 20_000, a0), test_coin(2, 30_000, a1)];

    let outputs = [Output {
        destination: Destination::Address(test_address(0xee)),
        value: OutputValue::Sats(40_000),
    }];
    let mut tx = make_unsigned_transaction(
        &coins,
        &outputs,
        FeePolicy::CustomRate(1000),
        &change(),
        true,
    )
    .unwrap();
    assert!(!tx.is_complete());

    signer.sign_transaction(&mut tx).unwrap();
    assert!(tx.is_complete());
    assert_eq!(tx.input_value(), tx.output_value() + tx.fee());
    assert!(tx.fee() >= tx.estimated_size() as u64);

    // Signed serialization matches the estimate within the per-input
    // signature-length slack.
    let raw = tx.serialize();
    let delta = tx.estimated_size().abs_diff(raw.len());
    assert!(delta <= 2 * tx.inputs.len(), "size estimate off by {}", delta);

    let backend = MockBackend::new();
    let txid = backend.broadcast(&raw).unwrap();
    assert_eq!(backend.broadcast_count(), 1);
    assert_eq!(backend.broadcasts()[0], raw);
    assert_eq!(txid.to_string().len(), 64);
}

#[test]
fn payto_lines_flow_through_builder_in_order() {
    let net = Network::Mainnet;
    let dests: Vec<String> = (1u8..=3)
        .map(|t| test_address(t).to_cashaddr(net))
        .collect();
    let text = format!("{}, 10\n{}, 20\n{}, 30", dests[0], dests[1], dests[2]);
    let parsed = parse_payto(&text, net, 2, &|_| None);
    assert_eq!(parsed.outputs.len(), 3);
    assert!(parsed.errors.is_empty());

    let coins = [test_coin(9, 100_000, test_address(0xaa))];
    let tx = make_unsigned_transaction(
        &coins,
        &parsed.outputs,
        FeePolicy::CustomRate(1000),
        &change(),
        false,
    )
    .unwrap();

    // Unshuffled: the three payees stay in input order, change comes last.
    let values: Vec<u64> = tx.outputs.iter().map(|o| o.value).collect();
    assert_eq!(&values[..3], &[1000, 2000, 3000]);
    assert_eq!(tx.outputs.len(), 4);
}

#[test]
fn max_send_spends_wallet_exactly() {
    let mut signer = test_signer();
    let a0 = signer.derive(KeyBranch::Receiving, 0).unwrap();
    let coins: Vec<Coin> = (1u8..=4).map(|t| test_coin(t, 2500, a0)).collect();

    let outputs = [Output {
        destination: Destination::Address(test_address(0xee)),
        value: OutputValue::Max,
    }];
    let mut tx = make_unsigned_transaction(
        &coins,
        &outputs,
        FeePolicy::CustomRate(1000),
        &change(),
        false,
    )
    .unwrap();

    assert_eq!(tx.inputs.len(), 4);
    assert_eq!(tx.outputs.len(), 1);
    assert_eq!(tx.outputs[0].value + tx.fee(), 10_000);

    signer.sign_transaction(&mut tx).unwrap();
    assert!(tx.is_complete());
}

#[test]
fn opreturn_payment_keeps_order_when_unshuffled() {
    let op = centavo_sdk::op_return::output_for_stringdata("protocol data").unwrap();
    let outputs = [
        Output {
            destination: Destination::Address(test_address(0xee)),
            value: OutputValue::Sats(1000),
        },
        op,
    ];
    let coins = [test_coin(1, 10_000, test_address(0xaa))];
    let tx = make_unsigned_transaction(
        &coins,
        &outputs,
        FeePolicy::CustomRate(1000),
        &change(),
        false,
    )
    .unwrap();
    assert_eq!(tx.outputs[0].value, 1000);
    assert!(tx.outputs[1].is_opreturn());
}
