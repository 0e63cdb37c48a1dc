//! Transaction assembly: signed, templated, and raw builds.
//!
//! A build never mutates the ledger; inputs are only retired when the
//! resulting transaction is later ingested. The builder's one ledger
//! dependency is the re-validation pass immediately before assembly: if a
//! concurrent spend consumed a selected coin the build fails with
//! `StaleSelection` and the caller retries selection.
//!
//! Templated builds carry real input scripts and zero-filled witness
//! signatures, so their serialized length equals the signed form exactly
//! and a fee computed at templating time stays valid after signing. Raw
//! builds leave scripts and witnesses empty for external signing; their
//! size is only a lower bound.

use brook_core::crypto;
use brook_core::script::{self, ScriptKind};
use brook_core::types::{Hash256, Transaction, TxInput, TxOutput, WITNESS_SIG_LEN};

use tracing::debug;

use crate::account::{Account, AccountType};
use crate::coin_selection::Selection;
use crate::error::WalletError;
use crate::keys::{self, Branch, KeyChain};
use crate::ledger::Ledger;

/// How the caller wants input scripts produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildMode {
    /// Full signatures from the account's key material.
    Signed,
    /// Size-accurate placeholders; no signatures yet.
    Templated,
    /// Empty scripts for external signing; size is a lower bound.
    Raw,
}

/// Signing state of a built transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningState {
    UnsignedTemplate,
    UnsignedRaw,
    FullySigned,
}

/// The change output a spend plan will create, if any.
#[derive(Clone, Debug)]
pub struct ChangeOutput {
    pub value: u64,
    pub script: Vec<u8>,
    pub branch: Branch,
    pub index: u32,
}

/// A funded spend: selection plus target and change outputs, ready to be
/// finalized into a transaction.
#[derive(Clone, Debug)]
pub struct SpendPlan {
    pub account: u32,
    pub targets: Vec<TxOutput>,
    pub selection: Selection,
    pub change: Option<ChangeOutput>,
    pub fee_rate: u64,
}

/// Result of a build.
#[derive(Clone, Debug)]
pub struct PendingTransaction {
    pub tx: Transaction,
    pub txid: Hash256,
    pub state: SigningState,
    /// Fee in drips.
    pub fee: u64,
    /// Change value, if a change output was appended.
    pub change: Option<u64>,
}

/// Finalize a spend plan into a transaction.
///
/// Re-validates every selected coin against the live ledger first; a coin
/// spent since selection fails the build with `StaleSelection`.
pub fn finalize(
    plan: &SpendPlan,
    mode: BuildMode,
    ledger: &Ledger,
    accounts: &[Account],
    keychain: &mut KeyChain,
    lock_time: u64,
) -> Result<PendingTransaction, WalletError> {
    // Race protection: the selection may predate other spends.
    for coin in &plan.selection.coins {
        if !ledger.is_unspent(&coin.outpoint) {
            return Err(WalletError::StaleSelection(coin.outpoint.to_string()));
        }
    }

    let account = accounts
        .get(plan.account as usize)
        .ok_or_else(|| WalletError::UnknownAccount(plan.account.to_string()))?;

    // Targets first in caller order, change appended last.
    let mut outputs = plan.targets.clone();
    if let Some(change) = &plan.change {
        outputs.push(TxOutput {
            value: change.value,
            script: change.script.clone(),
        });
    }

    let mut inputs = Vec::with_capacity(plan.selection.coins.len());
    let mut owners: Vec<(ScriptKind, Branch, u32)> = Vec::with_capacity(inputs.capacity());
    for selected in &plan.selection.coins {
        let coin = ledger
            .coin(&selected.outpoint)
            .ok_or_else(|| WalletError::StaleSelection(selected.outpoint.to_string()))?;
        let kind = script::classify_output(&coin.script).ok_or_else(|| {
            WalletError::BuildError(format!("untracked script on coin {}", coin.outpoint))
        })?;
        owners.push((kind, coin.branch, coin.address_index));

        let input = match mode {
            BuildMode::Raw => TxInput::bare(selected.outpoint.clone()),
            BuildMode::Templated | BuildMode::Signed => {
                let (input_script, slots) =
                    input_script_for(account, kind, coin.branch, coin.address_index)?;
                TxInput {
                    previous_output: selected.outpoint.clone(),
                    script: input_script,
                    witness: vec![vec![0u8; WITNESS_SIG_LEN]; slots],
                }
            }
        };
        inputs.push(input);
    }

    let mut tx = Transaction {
        version: 1,
        inputs,
        outputs,
        lock_time,
    };

    let state = match mode {
        BuildMode::Raw => SigningState::UnsignedRaw,
        BuildMode::Templated => SigningState::UnsignedTemplate,
        BuildMode::Signed => {
            sign_all(&mut tx, account, &owners, keychain)?;
            SigningState::FullySigned
        }
    };

    let txid = tx.txid()?;
    debug!(txid = %txid, ?mode, fee = plan.selection.fee, "built transaction");
    Ok(PendingTransaction {
        tx,
        txid,
        state,
        fee: plan.selection.fee,
        change: plan.change.as_ref().map(|c| c.value),
    })
}

/// Input script and witness slot count for spending a coin at the given
/// record path.
fn input_script_for(
    account: &Account,
    kind: ScriptKind,
    branch: Branch,
    index: u32,
) -> Result<(Vec<u8>, usize), WalletError> {
    match kind {
        ScriptKind::KeyHash(_) => {
            let child = keys::child_public_key(&account.account_key, branch, index)?;
            Ok((script::single_sig_input(&child.serialize()), 1))
        }
        ScriptKind::ScriptHash(_) => {
            let m = account.account_type.required_signatures();
            let mut child_keys = Vec::with_capacity(account.cosigners.len());
            for cosigner in &account.cosigners {
                child_keys.push(keys::child_public_key(cosigner, branch, index)?.serialize());
            }
            let input_script = script::multisig_input(m, &child_keys)?;
            Ok((input_script, m as usize))
        }
    }
}

/// Sign every input in place. Fails with `SigningError` when required
/// cosigner key material is absent.
fn sign_all(
    tx: &mut Transaction,
    account: &Account,
    owners: &[(ScriptKind, Branch, u32)],
    keychain: &mut KeyChain,
) -> Result<(), WalletError> {
    if matches!(account.account_type, AccountType::Multisig { .. }) && !account.initialized() {
        return Err(WalletError::SigningError(format!(
            "multisig account {} is missing cosigner keys",
            account.name
        )));
    }

    for (i, (kind, branch, index)) in owners.iter().enumerate() {
        if let ScriptKind::ScriptHash(_) = kind {
            let m = account.account_type.required_signatures();
            if m > 1 {
                // Only this wallet's cosigner key is held locally; the
                // remaining signatures must come from other cosigners.
                return Err(WalletError::SigningError(format!(
                    "{} signatures required but only one cosigner key is held",
                    m
                )));
            }
        }
        let keypair = keychain.child_keypair(account.index, *branch, *index)?;
        let signature = crypto::sign_input(tx, i, &keypair)?;
        tx.inputs[i].witness[0] = signature.to_vec();
    }
    Ok(())
}
