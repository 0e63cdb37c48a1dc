//! Seed management and deterministic hierarchical key derivation.
//!
//! A 32-byte master seed produces one secp256k1 account keypair per account
//! index via BLAKE3 keyed derivation. Child keys at (branch, index) are
//! additive tweaks of the account key: `child = account + t·G` where `t`
//! is derived from the account *public* key, the branch, and the index.
//! Because the tweak depends only on public data, a cosigner's child keys
//! are derivable from their registered account public key alone, which is
//! what makes multisig deposit addresses derivable before every private
//! key holder is online.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use brook_core::crypto::{KeyPair, PublicKey};

use crate::error::WalletError;

/// BLAKE3 KDF context for account key derivation.
const ACCOUNT_KDF_CONTEXT: &str = "brook-wallet-account-key-v1";

/// BLAKE3 KDF context for child key tweaks.
const CHILD_KDF_CONTEXT: &str = "brook-wallet-child-tweak-v1";

/// Derivation branch distinguishing receive from change addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Branch {
    /// Externally visible deposit addresses.
    Receive = 0,
    /// Internal change addresses, used only by the builder.
    Change = 1,
}

impl Branch {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Receive => write!(f, "receive"),
            Branch::Change => write!(f, "change"),
        }
    }
}

/// A 32-byte master seed for deterministic key derivation.
///
/// Secret material is zeroized on drop to prevent leaking key material in
/// freed memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 32],
}

impl Seed {
    /// Generate a random seed from the OS cryptographic RNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a seed from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl Clone for Seed {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed").field("bytes", &"[REDACTED]").finish()
    }
}

/// Deterministic key derivation chain from a master seed.
///
/// Account keypairs are cached after first derivation; child keypairs are
/// recomputed on demand (a single scalar addition).
pub struct KeyChain {
    seed: Seed,
    /// Cache of derived account keypairs by account index.
    accounts: HashMap<u32, KeyPair>,
}

impl KeyChain {
    pub fn new(seed: Seed) -> Self {
        Self {
            seed,
            accounts: HashMap::new(),
        }
    }

    /// Derive (and cache) the keypair for an account index.
    pub fn account_keypair(&mut self, account: u32) -> Result<&KeyPair, WalletError> {
        if !self.accounts.contains_key(&account) {
            let kp = derive_account_keypair(&self.seed, account)?;
            self.accounts.insert(account, kp);
        }
        Ok(&self.accounts[&account])
    }

    /// The account-level public key registered with cosigners.
    pub fn account_public_key(&mut self, account: u32) -> Result<PublicKey, WalletError> {
        Ok(self.account_keypair(account)?.public_key())
    }

    /// Our private child keypair at (account, branch, index).
    pub fn child_keypair(
        &mut self,
        account: u32,
        branch: Branch,
        index: u32,
    ) -> Result<KeyPair, WalletError> {
        let parent = self.account_keypair(account)?.clone();
        let tweak = child_tweak(&parent.public_key(), branch, index);
        parent
            .add_tweak(&tweak)
            .map_err(|e| WalletError::InvalidDerivation(e.to_string()))
    }

    /// Access the seed (for wallet file serialization and mnemonics).
    pub(crate) fn seed(&self) -> &Seed {
        &self.seed
    }
}

impl fmt::Debug for KeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyChain")
            .field("cached_accounts", &self.accounts.len())
            .finish()
    }
}

/// Derive the account keypair for `account` from the master seed.
fn derive_account_keypair(seed: &Seed, account: u32) -> Result<KeyPair, WalletError> {
    let mut ikm = Vec::with_capacity(36);
    ikm.extend_from_slice(seed.as_bytes());
    ikm.extend_from_slice(&account.to_le_bytes());
    let derived = blake3::derive_key(ACCOUNT_KDF_CONTEXT, &ikm);
    KeyPair::from_secret_bytes(derived)
        .map_err(|e| WalletError::InvalidDerivation(e.to_string()))
}

/// The additive tweak for a child at (branch, index) under `account_key`.
///
/// Depends only on the account public key, so any cosigner can compute it.
pub fn child_tweak(account_key: &PublicKey, branch: Branch, index: u32) -> [u8; 32] {
    let mut ikm = Vec::with_capacity(38);
    ikm.extend_from_slice(&account_key.serialize());
    ikm.push(branch.as_u8());
    ikm.extend_from_slice(&index.to_le_bytes());
    blake3::derive_key(CHILD_KDF_CONTEXT, &ikm)
}

/// Public child key at (branch, index) for any cosigner's account key.
pub fn child_public_key(
    account_key: &PublicKey,
    branch: Branch,
    index: u32,
) -> Result<PublicKey, WalletError> {
    let tweak = child_tweak(account_key, branch, index);
    account_key
        .add_tweak(&tweak)
        .map_err(|e| WalletError::InvalidDerivation(e.to_string()))
}
