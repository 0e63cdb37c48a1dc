//! Consensus parameters consumed by the wallet engine.
//!
//! These values are owned by the chain-validation layer; the wallet only
//! reads them. Tests inject their own instances (a maturity of zero turns
//! the coinbase maturity rule off entirely).

use serde::{Deserialize, Serialize};

use crate::constants;

/// Chain parameters the wallet needs for spendability and change decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Confirmations before a coinbase output may be spent. Zero disables.
    pub coinbase_maturity: u64,
    /// Minimum output value in drips; smaller change is folded into the fee.
    pub dust_threshold: u64,
}

impl ConsensusParams {
    /// Parameters with all thresholds disabled, for controlled test scenarios.
    pub fn permissive() -> Self {
        Self {
            coinbase_maturity: 0,
            dust_threshold: 0,
        }
    }
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            coinbase_maturity: constants::COINBASE_MATURITY,
            dust_threshold: constants::DUST_THRESHOLD,
        }
    }
}
