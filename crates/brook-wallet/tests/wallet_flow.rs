//! End-to-end wallet flows: funding, balance accounting, building in all
//! three modes, multisig account lifecycle, and conflict handling.

use brook_core::address::Network;
use brook_core::params::ConsensusParams;
use brook_core::script::OP_0;
use brook_core::types::{Hash256, OutPoint, Transaction, TxInput, TxOutput};

use brook_wallet::keys::Seed;
use brook_wallet::ledger::ConfirmationState;
use brook_wallet::wallet::Wallet;
use brook_wallet::{AccountType, BuildMode, SigningState, TxEventKind, WalletError, WalletEvent};

fn params() -> ConsensusParams {
    // Maturity off for controlled scenarios; standard dust floor.
    ConsensusParams {
        coinbase_maturity: 0,
        dust_threshold: 546,
    }
}

fn wallet() -> Wallet {
    Wallet::from_seed(Seed::from_bytes([42u8; 32]), Network::Testnet, params()).unwrap()
}

/// One external transaction paying `values` to `address`.
fn deposit_tx(address: &brook_core::address::Address, values: &[u64], salt: u8) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput::bare(OutPoint {
            txid: Hash256([salt; 32]),
            index: 0,
        })],
        outputs: values
            .iter()
            .map(|&value| TxOutput {
                value,
                script: address.script_pubkey(),
            })
            .collect(),
        lock_time: 0,
    }
}

#[test]
fn fund_then_send_walkthrough() {
    let w = wallet();
    let addr = w.next_receive_address("default").unwrap();

    // Four deposits of 50 460 drips to the same fresh receive address.
    let fund = deposit_tx(&addr, &[50_460; 4], 1);
    w.on_transaction_seen(&fund, ConfirmationState::Unconfirmed)
        .unwrap();

    let balance = w.get_balance("default").unwrap();
    assert_eq!(balance.unconfirmed, 201_840);
    assert_eq!(balance.confirmed, 0);
    assert_eq!(balance.coin_count, 4);

    // Self-send of 10 000 drips at 10 drips per byte.
    let target = w.next_receive_address("default").unwrap();
    let pending = w.send("default", &[(target, 10_000)], 10).unwrap();

    assert_eq!(pending.state, SigningState::FullySigned);
    assert_eq!(pending.tx.inputs.len(), 1);
    assert_eq!(pending.tx.outputs.len(), 2);
    assert_eq!(pending.tx.total_output_value(), Some(48_190));
    assert_eq!(pending.fee, 2_270);
    assert_eq!(pending.tx.serialized_size().unwrap(), 227);

    // Target first, change last.
    assert_eq!(pending.tx.outputs[0].value, 10_000);
    assert_eq!(pending.tx.outputs[1].value, 38_190);
    assert_eq!(pending.change, Some(38_190));

    // Only the fee left the wallet.
    let after = w.get_balance("default").unwrap();
    assert_eq!(after.unconfirmed, 199_570);
    assert_eq!(after.confirmed, 0);
}

#[test]
fn create_account_scenario() {
    let w = wallet();
    let foo = w.create_account("foo", AccountType::SingleSig).unwrap();
    assert_eq!(foo.index, 1);
    assert!(foo.initialized);

    let foo2 = w
        .create_account("foo2", AccountType::Multisig { m: 1, n: 2 })
        .unwrap();
    assert_eq!(foo2.index, 2);
    assert_eq!(foo2.m, 1);
    assert_eq!(foo2.n, 2);
    assert!(!foo2.initialized);
}

#[test]
fn templated_placeholder_is_35_bytes() {
    let w = wallet();
    let addr = w.next_receive_address("default").unwrap();
    w.on_transaction_seen(&deposit_tx(&addr, &[50_460], 1), ConfirmationState::Unconfirmed)
        .unwrap();

    let pending = w
        .create_tx("default", &[(addr, 10_000)], 10, BuildMode::Templated)
        .unwrap();

    assert_eq!(pending.state, SigningState::UnsignedTemplate);
    let script = &pending.tx.inputs[0].script;
    assert_eq!(script.len(), 35);
    assert_eq!(script[0], OP_0);
    // One zero-filled 64-byte witness slot stands in for the signature.
    assert_eq!(pending.tx.inputs[0].witness, vec![vec![0u8; 64]]);
}

#[test]
fn raw_build_has_empty_scripts() {
    let w = wallet();
    let addr = w.next_receive_address("default").unwrap();
    w.on_transaction_seen(&deposit_tx(&addr, &[50_460], 1), ConfirmationState::Unconfirmed)
        .unwrap();

    let pending = w
        .create_tx("default", &[(addr, 10_000)], 10, BuildMode::Raw)
        .unwrap();

    assert_eq!(pending.state, SigningState::UnsignedRaw);
    for input in &pending.tx.inputs {
        assert!(input.script.is_empty());
        assert!(input.witness.is_empty());
    }
}

#[test]
fn templated_and_signed_sizes_match() {
    let w = wallet();
    let addr = w.next_receive_address("default").unwrap();
    w.on_transaction_seen(&deposit_tx(&addr, &[50_460; 2], 1), ConfirmationState::Unconfirmed)
        .unwrap();

    let plan = w
        .prepare_spend("default", &[(addr.clone(), 60_000)], 10)
        .unwrap();
    let templated = w.finalize_spend(&plan, BuildMode::Templated).unwrap();
    let signed = w.finalize_spend(&plan, BuildMode::Signed).unwrap();

    assert_eq!(
        templated.tx.serialized_size().unwrap(),
        signed.tx.serialized_size().unwrap()
    );
    assert_eq!(templated.txid, signed.txid);
    assert_eq!(templated.fee, signed.fee);
}

#[test]
fn ingest_is_idempotent() {
    let w = wallet();
    let addr = w.next_receive_address("default").unwrap();
    let fund = deposit_tx(&addr, &[50_460; 4], 1);

    w.on_transaction_seen(&fund, ConfirmationState::Unconfirmed)
        .unwrap();
    let once = w.get_balance("default").unwrap();

    w.on_transaction_seen(&fund, ConfirmationState::Unconfirmed)
        .unwrap();
    let twice = w.get_balance("default").unwrap();
    assert_eq!(once, twice);
}

#[test]
fn confirmation_flow() {
    let w = wallet();
    let addr = w.next_receive_address("default").unwrap();
    let fund = deposit_tx(&addr, &[50_460], 1);
    w.on_transaction_seen(&fund, ConfirmationState::Unconfirmed)
        .unwrap();
    assert_eq!(w.get_balance("default").unwrap().confirmed, 0);

    w.on_transaction_confirmed(fund.txid().unwrap(), 100).unwrap();
    let balance = w.get_balance("default").unwrap();
    assert_eq!(balance.confirmed, 50_460);
    assert_eq!(balance.unconfirmed, 50_460);

    let detail = w.get_tx(&fund.txid().unwrap()).unwrap();
    assert_eq!(detail.state, ConfirmationState::Confirmed { height: 100 });
}

#[test]
fn coinbase_maturity_gates_spending() {
    let strict = ConsensusParams {
        coinbase_maturity: 100,
        dust_threshold: 546,
    };
    let w = Wallet::from_seed(Seed::from_bytes([7u8; 32]), Network::Testnet, strict).unwrap();
    let addr = w.next_receive_address("default").unwrap();

    let coinbase = Transaction {
        version: 1,
        inputs: vec![TxInput::bare(OutPoint::null())],
        outputs: vec![TxOutput {
            value: 5_000_000,
            script: addr.script_pubkey(),
        }],
        lock_time: 0,
    };
    w.on_transaction_seen(&coinbase, ConfirmationState::Confirmed { height: 10 })
        .unwrap();

    // Not yet mature: unspendable and excluded from confirmed.
    let balance = w.get_balance("default").unwrap();
    assert_eq!(balance.unconfirmed, 5_000_000);
    assert_eq!(balance.confirmed, 0);
    let err = w
        .create_tx("default", &[(addr.clone(), 10_000)], 10, BuildMode::Signed)
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds { .. }));

    // Push the tip past maturity.
    let marker = deposit_tx(&addr, &[1_000], 9);
    w.on_transaction_seen(&marker, ConfirmationState::Confirmed { height: 110 })
        .unwrap();
    assert_eq!(w.get_balance("default").unwrap().confirmed, 5_001_000);
    assert!(
        w.create_tx("default", &[(addr, 10_000)], 10, BuildMode::Signed)
            .is_ok()
    );
}

#[test]
fn multisig_lifecycle() {
    let w = wallet();
    w.create_account("shared", AccountType::Multisig { m: 1, n: 2 })
        .unwrap();

    // Deposits can be collected before the cosigner set is complete.
    let early = w.next_receive_address("shared").unwrap();
    w.on_transaction_seen(&deposit_tx(&early, &[50_460], 1), ConfirmationState::Unconfirmed)
        .unwrap();
    assert_eq!(w.get_balance("shared").unwrap().unconfirmed, 50_460);

    // Signing is refused while uninitialized.
    let err = w
        .send("shared", &[(early.clone(), 10_000)], 10)
        .unwrap_err();
    assert!(matches!(err, WalletError::SigningError(_)));

    // Register the missing cosigner.
    let other = Wallet::from_seed(Seed::from_bytes([9u8; 32]), Network::Testnet, params()).unwrap();
    let other_key = other.account_public_key("default").unwrap();
    let info = w.add_cosigner("shared", other_key).unwrap();
    assert!(info.initialized);

    // New receive addresses commit to the 1-of-2 program.
    let shared_addr = w.next_receive_address("shared").unwrap();
    assert_eq!(
        shared_addr.kind(),
        brook_core::address::AddressKind::ScriptHash
    );
    w.on_transaction_seen(
        &deposit_tx(&shared_addr, &[80_000], 2),
        ConfirmationState::Unconfirmed,
    )
    .unwrap();

    // A spend drawing on both the early single-sig coin and the
    // multisig coin needs only this wallet's signature for 1-of-2.
    let pending = w.send("shared", &[(shared_addr, 60_000)], 10).unwrap();
    assert_eq!(pending.state, SigningState::FullySigned);
    assert_eq!(pending.tx.inputs.len(), 2);
}

#[test]
fn stale_selection_rejected_and_retry_succeeds() {
    let w = wallet();
    let addr = w.next_receive_address("default").unwrap();
    w.on_transaction_seen(&deposit_tx(&addr, &[50_460], 1), ConfirmationState::Unconfirmed)
        .unwrap();

    let plan = w.prepare_spend("default", &[(addr.clone(), 10_000)], 10).unwrap();

    // A competing send consumes the selected coin first.
    w.send("default", &[(addr.clone(), 30_000)], 10).unwrap();

    let err = w.finalize_spend(&plan, BuildMode::Signed).unwrap_err();
    assert!(matches!(err, WalletError::StaleSelection(_)));

    // Retrying the selection funds the spend from the change coin.
    let retry = w.prepare_spend("default", &[(addr, 10_000)], 10).unwrap();
    assert!(w.finalize_spend(&retry, BuildMode::Signed).is_ok());
}

#[test]
fn invalid_fee_rate_rejected() {
    let w = wallet();
    let addr = w.next_receive_address("default").unwrap();
    w.on_transaction_seen(&deposit_tx(&addr, &[50_460], 1), ConfirmationState::Unconfirmed)
        .unwrap();

    let err = w
        .create_tx("default", &[(addr, 10_000)], 0, BuildMode::Signed)
        .unwrap_err();
    assert_eq!(err, WalletError::InvalidFeeRate(0));
}

#[test]
fn insufficient_funds_surfaced() {
    let w = wallet();
    let addr = w.next_receive_address("default").unwrap();
    w.on_transaction_seen(&deposit_tx(&addr, &[5_000], 1), ConfirmationState::Unconfirmed)
        .unwrap();

    let err = w
        .create_tx("default", &[(addr, 100_000)], 10, BuildMode::Signed)
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds { .. }));
}

#[test]
fn conflict_cascade_restores_balance() {
    let w = wallet();
    let addr = w.next_receive_address("default").unwrap();
    w.on_transaction_seen(&deposit_tx(&addr, &[50_460], 1), ConfirmationState::Unconfirmed)
        .unwrap();

    // Chain two self-spends, then conflict the first away.
    let first = w.send("default", &[(addr.clone(), 10_000)], 10).unwrap();
    let second = w.send("default", &[(addr.clone(), 5_000)], 10).unwrap();
    assert_ne!(first.txid, second.txid);

    w.on_transaction_conflict(first.txid).unwrap();
    assert!(w.get_tx(&first.txid).is_none());
    assert!(w.get_tx(&second.txid).is_none());
    assert_eq!(w.get_balance("default").unwrap().unconfirmed, 50_460);
}

#[test]
fn event_order_on_mutation() {
    let w = wallet();
    let mut rx = w.subscribe();
    let addr = w.current_receive_address("default").unwrap();

    w.on_transaction_seen(&deposit_tx(&addr, &[1_000], 1), ConfirmationState::Unconfirmed)
        .unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(match event {
            WalletEvent::AddressExposed { .. } => "address",
            WalletEvent::BalanceChanged { .. } => "balance",
            WalletEvent::Transaction { kind, .. } => {
                assert_eq!(kind, TxEventKind::Seen);
                "tx"
            }
        });
    }
    assert_eq!(kinds, vec!["address", "balance", "tx"]);
}

#[test]
fn balance_invariant_over_mixed_feed() {
    let w = wallet();
    let addr = w.next_receive_address("default").unwrap();

    let mut txids = Vec::new();
    for i in 0..8u8 {
        let tx = deposit_tx(&addr, &[(i as u64 + 1) * 3_000], i + 1);
        txids.push(tx.txid().unwrap());
        let state = if i % 2 == 0 {
            ConfirmationState::Unconfirmed
        } else {
            ConfirmationState::Confirmed { height: i as u64 }
        };
        w.on_transaction_seen(&tx, state).unwrap();

        let balance = w.get_balance("default").unwrap();
        assert!(balance.unconfirmed >= balance.confirmed);
    }

    for (i, txid) in txids.iter().enumerate() {
        w.on_transaction_confirmed(*txid, 50 + i as u64).unwrap();
        let balance = w.get_balance("default").unwrap();
        assert!(balance.unconfirmed >= balance.confirmed);
    }

    // Everything confirmed: the totals meet.
    let balance = w.get_balance("default").unwrap();
    assert_eq!(balance.unconfirmed, balance.confirmed);
}
