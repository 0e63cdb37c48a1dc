//! Wallet error types.

use brook_core::error::{AddressError, CryptoError, ScriptError, TransactionError};
use thiserror::Error;

/// Errors that can occur in wallet operations.
///
/// Expected business outcomes (insufficient funds, a bad fee rate, a raced
/// selection) are ordinary variants surfaced to the caller; nothing here is
/// a panic path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Account creation parameters are unusable (e.g. m > n).
    #[error("invalid account config: {0}")]
    InvalidAccountConfig(String),

    /// Spendable coins cannot cover the target plus fee.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Spendable balance in drips.
        have: u64,
        /// Required amount in drips.
        need: u64,
    },

    /// Fee rate must be strictly positive.
    #[error("invalid fee rate: {0}")]
    InvalidFeeRate(u64),

    /// Required key material is missing; retrying cannot succeed.
    #[error("signing: {0}")]
    SigningError(String),

    /// A concurrently applied spend consumed a selected coin. Retry the
    /// selection.
    #[error("stale selection: coin {0} is no longer unspent")]
    StaleSelection(String),

    /// Derivation index overflow or an invalid tweak; indicates an
    /// upstream programming error.
    #[error("invalid derivation: {0}")]
    InvalidDerivation(String),

    /// No account with that name or index.
    #[error("unknown account: {0}")]
    UnknownAccount(String),

    /// Account names are unique per wallet.
    #[error("duplicate account: {0}")]
    DuplicateAccount(String),

    /// Transaction is not tracked by this wallet.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Transaction build error.
    #[error("build error: {0}")]
    BuildError(String),

    /// Wrong password for wallet file.
    #[error("invalid password")]
    InvalidPassword,

    /// Wallet file is corrupted or has invalid format.
    #[error("corrupted file: {0}")]
    CorruptedFile(String),

    /// Encryption failure.
    #[error("encryption: {0}")]
    Encryption(String),

    /// Decryption failure.
    #[error("decryption: {0}")]
    Decryption(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// Invalid BIP-39 mnemonic phrase.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Cryptographic error from brook-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Transaction encoding error from brook-core.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Script construction error from brook-core.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Address encoding error from brook-core.
    #[error(transparent)]
    Address(#[from] AddressError),
}
