//! # brook-wallet — HD account wallet with fee-accurate templating.
//!
//! The wallet-side engine of a Brook node: deterministic hierarchical key
//! derivation per account and branch, a UTXO ledger with conflict
//! handling, recomputed confirmed/unconfirmed balances, fee-rate coin
//! selection, transaction building in signed, templated, and raw modes,
//! ordered event dispatch, and encrypted file persistence.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` enum
//! - [`keys`] — Seed, KeyChain, BLAKE3/secp256k1 derivation
//! - [`account`] — Accounts, cosigners, branch cursors, address records
//! - [`ledger`] — Owned-coin ledger with spend journal and eviction
//! - [`balance`] — Confirmed/unconfirmed recomputation
//! - [`coin_selection`] — Oldest-first selection under a fee rate
//! - [`builder`] — Signed/templated/raw transaction assembly
//! - [`events`] — Ordered per-account notifications
//! - [`encryption`] — Argon2id + AES-256-GCM wallet file encryption
//! - [`mnemonic`] — BIP-39 seed backup
//! - [`wallet`] — High-level wallet composition

pub mod account;
pub mod balance;
pub mod builder;
pub mod coin_selection;
pub mod encryption;
pub mod error;
pub mod events;
pub mod keys;
pub mod ledger;
pub mod mnemonic;
pub mod wallet;

// Re-exports for convenient access
pub use account::{Account, AccountInfo, AccountType, AddressBook, AddressRecord};
pub use balance::{Balance, balance_of};
pub use builder::{BuildMode, PendingTransaction, SigningState, SpendPlan};
pub use coin_selection::{Selection, SpendableCoin, select};
pub use error::WalletError;
pub use events::{EventDispatcher, TxEventKind, WalletEvent};
pub use keys::{Branch, KeyChain, Seed};
pub use ledger::{Coin, ConfirmationState, IngestOutcome, Ledger, TxRecord};
pub use wallet::{TransactionDetail, Wallet};
