//! Fee-rate-driven coin selection.
//!
//! Coins are consumed oldest-first by ingestion sequence (ties broken by
//! outpoint order), accumulating until the selected value covers the
//! requested outputs plus the fee for the transaction those selections
//! imply. Input sizes are supplied by the caller per coin, computed from
//! the owning account's script shape, so the size estimate is exact for a
//! templated build and therefore for the signed transaction as well.
//!
//! Change below the dust threshold is not worth an output; the surplus is
//! folded into the fee instead.

use brook_core::types::{OutPoint, TxOutput, varint_len};

use crate::error::WalletError;

/// A coin eligible for selection, annotated with its serialized input
/// size (outpoint, script, and witness slots included).
#[derive(Clone, Debug)]
pub struct SpendableCoin {
    pub outpoint: OutPoint,
    /// Value in drips.
    pub value: u64,
    /// Ingestion sequence of the creating transaction.
    pub sequence: u64,
    /// Full serialized input length once templated or signed.
    pub input_size: usize,
}

/// Result of coin selection.
#[derive(Clone, Debug)]
pub struct Selection {
    /// Chosen coins, in consumption order.
    pub coins: Vec<SpendableCoin>,
    /// Fee in drips. When no change output is created this absorbs the
    /// whole surplus, so it can exceed `size * fee_rate`.
    pub fee: u64,
    /// Change value in drips; zero means no change output.
    pub change: u64,
    /// Estimated serialized size of the final transaction in bytes.
    pub size: usize,
}

impl Selection {
    pub fn has_change(&self) -> bool {
        self.change > 0
    }

    /// Total value of the chosen coins.
    pub fn total_input(&self) -> u64 {
        self.coins.iter().map(|c| c.value).sum()
    }
}

/// Select coins to fund `targets` at `fee_rate` drips per byte.
///
/// `change_script_len` is the locking-script length a change output would
/// have (the change address is derived before selection so the estimate
/// can include it).
pub fn select(
    mut spendable: Vec<SpendableCoin>,
    targets: &[TxOutput],
    fee_rate: u64,
    dust_threshold: u64,
    change_script_len: usize,
) -> Result<Selection, WalletError> {
    if fee_rate == 0 {
        return Err(WalletError::InvalidFeeRate(fee_rate));
    }
    if targets.is_empty() {
        return Err(WalletError::BuildError("no target outputs".into()));
    }
    let mut required: u64 = 0;
    for target in targets {
        if target.value == 0 {
            return Err(WalletError::InvalidAmount("zero-value output".into()));
        }
        required = required
            .checked_add(target.value)
            .ok_or_else(|| WalletError::InvalidAmount("output total overflow".into()))?;
    }

    // Deterministic consumption order: oldest ingestion first, outpoint
    // order breaking ties.
    spendable.sort_by(|a, b| {
        a.sequence
            .cmp(&b.sequence)
            .then_with(|| a.outpoint.cmp(&b.outpoint))
    });

    let targets_size: usize = targets
        .iter()
        .map(|t| 8 + varint_len(t.script.len() as u64) + t.script.len())
        .sum();
    let change_output_size = 8 + varint_len(change_script_len as u64) + change_script_len;

    let mut chosen: Vec<SpendableCoin> = Vec::new();
    let mut accumulated: u64 = 0;
    let mut inputs_size: usize = 0;
    let mut fee_with_change: u64 = 0;

    for coin in spendable {
        accumulated = accumulated.saturating_add(coin.value);
        inputs_size += coin.input_size;
        chosen.push(coin);

        let size_with_change = tx_size(
            chosen.len(),
            inputs_size,
            targets.len() + 1,
            targets_size + change_output_size,
        );
        fee_with_change = checked_fee(size_with_change, fee_rate)?;

        let needed = required.saturating_add(fee_with_change);
        if accumulated >= needed {
            let surplus = accumulated - needed;
            if surplus >= dust_threshold && surplus > 0 {
                return Ok(Selection {
                    coins: chosen,
                    fee: fee_with_change,
                    change: surplus,
                    size: size_with_change,
                });
            }
            // Dust surplus: drop the change output and let the fee absorb
            // the difference.
            let size = tx_size(chosen.len(), inputs_size, targets.len(), targets_size);
            return Ok(Selection {
                coins: chosen,
                fee: accumulated - required,
                change: 0,
                size,
            });
        }
    }

    // The whole spendable set cannot cover target plus fee. One last look
    // without a change output, whose smaller size may just fit.
    if !chosen.is_empty() {
        let size = tx_size(chosen.len(), inputs_size, targets.len(), targets_size);
        let fee = checked_fee(size, fee_rate)?;
        if accumulated >= required.saturating_add(fee) {
            return Ok(Selection {
                fee: accumulated - required,
                coins: chosen,
                change: 0,
                size,
            });
        }
    }

    Err(WalletError::InsufficientFunds {
        have: accumulated,
        need: required.saturating_add(fee_with_change),
    })
}

/// Serialized transaction size from part sizes.
fn tx_size(n_inputs: usize, inputs_size: usize, n_outputs: usize, outputs_size: usize) -> usize {
    8 + varint_len(n_inputs as u64) + inputs_size + varint_len(n_outputs as u64) + outputs_size + 8
}

fn checked_fee(size: usize, fee_rate: u64) -> Result<u64, WalletError> {
    (size as u64)
        .checked_mul(fee_rate)
        .ok_or_else(|| WalletError::InvalidAmount("fee overflow".into()))
}
