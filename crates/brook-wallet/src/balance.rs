//! Balance accounting: confirmed and unconfirmed totals per account.
//!
//! Balances are always re-derived from the live coin set, never adjusted
//! incrementally, so no sequence of ingests, confirms, and evictions can
//! drift the totals away from the coins that back them.

use brook_core::constants::COIN;
use brook_core::params::ConsensusParams;

use crate::ledger::Ledger;

/// Per-account balance aggregate in drips.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Balance {
    /// Owned, unspent, confirmed coins past any coinbase maturity.
    pub confirmed: u64,
    /// All owned, unspent coins regardless of confirmation state.
    pub unconfirmed: u64,
    /// Number of unspent coins backing these totals.
    pub coin_count: usize,
}

impl Balance {
    /// Confirmed balance in BROOK (display helper, not for consensus).
    pub fn confirmed_brook(&self) -> f64 {
        self.confirmed as f64 / COIN as f64
    }

    /// Unconfirmed balance in BROOK (display helper, not for consensus).
    pub fn unconfirmed_brook(&self) -> f64 {
        self.unconfirmed as f64 / COIN as f64
    }
}

/// Recompute the balance of one account from the unspent coin set.
///
/// `unconfirmed` sums every owned unspent coin; `confirmed` only those in
/// a confirmed state that have cleared coinbase maturity at `tip_height`.
pub fn balance_of(
    ledger: &Ledger,
    account: u32,
    tip_height: u64,
    params: &ConsensusParams,
) -> Balance {
    let mut balance = Balance::default();
    for coin in ledger.unspent_for(account) {
        balance.unconfirmed = balance.unconfirmed.saturating_add(coin.value);
        if coin.counts_confirmed(tip_height, params) {
            balance.confirmed = balance.confirmed.saturating_add(coin.value);
        }
        balance.coin_count += 1;
    }
    balance
}
