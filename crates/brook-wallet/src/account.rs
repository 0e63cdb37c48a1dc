//! Accounts, branch cursors, and the address-record arena.
//!
//! An account owns two derivation branches (receive and change), each with
//! a monotonically increasing cursor. Derived addresses are immortalized as
//! [`AddressRecord`]s in an [`AddressBook`] arena indexed both by
//! (account, branch, index) and by the 20-byte hash the ledger matches
//! incoming outputs against. Indices are never reused; the cursor only
//! moves forward, and a lookahead window keeps records derived past it so
//! deposits to not-yet-handed-out addresses are still recognized.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use brook_core::address::{Address, AddressKind, Network};
use brook_core::crypto::PublicKey;
use brook_core::script::{self, MAX_MULTISIG_KEYS};
use brook_core::types::Hash160;

use crate::error::WalletError;
use crate::keys::{self, Branch, KeyChain};

/// Account type: single-signature or m-of-n multisig.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    SingleSig,
    Multisig { m: u8, n: u8 },
}

impl AccountType {
    /// Validate creation parameters.
    fn validate(&self) -> Result<(), WalletError> {
        match *self {
            AccountType::SingleSig => Ok(()),
            AccountType::Multisig { m, n } => {
                if m < 1 || n < 1 || m > n || n > MAX_MULTISIG_KEYS {
                    Err(WalletError::InvalidAccountConfig(format!(
                        "unusable quorum: {m} of {n}"
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Signatures required to spend (m, or 1 for single-sig).
    pub fn required_signatures(&self) -> u8 {
        match *self {
            AccountType::SingleSig => 1,
            AccountType::Multisig { m, .. } => m,
        }
    }

    /// Cosigner keys the account needs before it is initialized.
    pub fn required_cosigners(&self) -> usize {
        match *self {
            AccountType::SingleSig => 1,
            AccountType::Multisig { n, .. } => n as usize,
        }
    }
}

/// Per-branch derivation cursor.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct BranchState {
    next_index: u32,
}

/// A wallet account with its cosigner set and branch cursors.
#[derive(Clone, Debug)]
pub struct Account {
    pub name: String,
    pub index: u32,
    pub account_type: AccountType,
    /// This wallet's account-level public key (always cosigner 0).
    pub account_key: PublicKey,
    /// Ordered cosigner account keys; order is part of the redeem script.
    pub cosigners: Vec<PublicKey>,
    /// Branch cursors at the moment the cosigner set completed. Indices
    /// below these derive single-sig deposit records (handed out while
    /// keys were still being collected); indices at or above derive the
    /// m-of-n program. None while uninitialized.
    multisig_from: Option<(u32, u32)>,
    receive: BranchState,
    change: BranchState,
}

impl Account {
    /// Create an account. Fails with `InvalidAccountConfig` for m > n or
    /// n < 1 quorums.
    pub fn new(
        name: impl Into<String>,
        index: u32,
        account_type: AccountType,
        account_key: PublicKey,
    ) -> Result<Self, WalletError> {
        account_type.validate()?;
        let mut account = Self {
            name: name.into(),
            index,
            account_type,
            account_key,
            cosigners: vec![account_key],
            multisig_from: None,
            receive: BranchState::default(),
            change: BranchState::default(),
        };
        if matches!(account.account_type, AccountType::Multisig { .. }) && account.initialized() {
            account.multisig_from = Some((0, 0));
        }
        Ok(account)
    }

    /// True once every cosigner key is registered. Single-sig accounts are
    /// always initialized.
    pub fn initialized(&self) -> bool {
        self.cosigners.len() == self.account_type.required_cosigners()
    }

    /// Register another cosigner's account public key.
    pub fn add_cosigner(&mut self, key: PublicKey) -> Result<(), WalletError> {
        if matches!(self.account_type, AccountType::SingleSig) {
            return Err(WalletError::InvalidAccountConfig(
                "single-sig account takes no cosigners".into(),
            ));
        }
        if self.initialized() {
            return Err(WalletError::InvalidAccountConfig(
                "cosigner set already complete".into(),
            ));
        }
        if self.cosigners.contains(&key) {
            return Err(WalletError::InvalidAccountConfig(
                "duplicate cosigner key".into(),
            ));
        }
        self.cosigners.push(key);
        if self.initialized() {
            self.multisig_from = Some((self.receive.next_index, self.change.next_index));
        }
        Ok(())
    }

    /// Whether the record at (branch, index) commits to the m-of-n
    /// program rather than a single-sig deposit key.
    pub fn uses_multisig_program(&self, branch: Branch, index: u32) -> bool {
        if !matches!(self.account_type, AccountType::Multisig { .. }) || !self.initialized() {
            return false;
        }
        let (receive_from, change_from) = self.multisig_from.unwrap_or((0, 0));
        match branch {
            Branch::Receive => index >= receive_from,
            Branch::Change => index >= change_from,
        }
    }

    /// The branch cursor: next index that `advance` will hand out.
    pub fn cursor(&self, branch: Branch) -> u32 {
        match branch {
            Branch::Receive => self.receive.next_index,
            Branch::Change => self.change.next_index,
        }
    }

    /// Fetch-and-increment the branch cursor. Callers hold the wallet
    /// lock, which is what makes two concurrent derivations impossible.
    pub fn advance(&mut self, branch: Branch) -> Result<u32, WalletError> {
        let state = match branch {
            Branch::Receive => &mut self.receive,
            Branch::Change => &mut self.change,
        };
        let index = state.next_index;
        state.next_index = index.checked_add(1).ok_or_else(|| {
            WalletError::InvalidDerivation(format!("{branch} branch index overflow"))
        })?;
        Ok(index)
    }

    /// Move the cursor past `index` after observing a deposit there.
    /// Returns true if the cursor actually moved.
    pub fn advance_past(&mut self, branch: Branch, index: u32) -> Result<bool, WalletError> {
        let state = match branch {
            Branch::Receive => &mut self.receive,
            Branch::Change => &mut self.change,
        };
        if index < state.next_index {
            return Ok(false);
        }
        state.next_index = index.checked_add(1).ok_or_else(|| {
            WalletError::InvalidDerivation(format!("{branch} branch index overflow"))
        })?;
        Ok(true)
    }

    /// Restore branch cursors and the multisig activation point from
    /// persisted state.
    pub(crate) fn restore_cursors(
        &mut self,
        receive: u32,
        change: u32,
        multisig_from: Option<(u32, u32)>,
    ) {
        self.receive.next_index = receive;
        self.change.next_index = change;
        self.multisig_from = multisig_from;
    }

    pub(crate) fn multisig_from(&self) -> Option<(u32, u32)> {
        self.multisig_from
    }

    /// Summary exposed to the RPC layer.
    pub fn info(&self) -> AccountInfo {
        let (m, n) = match self.account_type {
            AccountType::SingleSig => (1, 1),
            AccountType::Multisig { m, n } => (m, n),
        };
        AccountInfo {
            name: self.name.clone(),
            index: self.index,
            account_type: self.account_type,
            m,
            n,
            initialized: self.initialized(),
            receive_index: self.receive.next_index,
            change_index: self.change.next_index,
        }
    }
}

/// Account summary for external consumers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub name: String,
    pub index: u32,
    pub account_type: AccountType,
    pub m: u8,
    pub n: u8,
    pub initialized: bool,
    pub receive_index: u32,
    pub change_index: u32,
}

/// An immutable derived address at (account, branch, index).
#[derive(Clone, Debug)]
pub struct AddressRecord {
    pub account: u32,
    pub branch: Branch,
    pub index: u32,
    pub address: Address,
}

/// Arena of derived address records with hash and path lookups.
#[derive(Default)]
pub struct AddressBook {
    records: Vec<AddressRecord>,
    by_hash: HashMap<Hash160, usize>,
    by_path: HashMap<(u32, Branch, u32), usize>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. A path collision returns the existing record (a
    /// record, once derived, never changes).
    pub fn insert(&mut self, record: AddressRecord) -> &AddressRecord {
        let path = (record.account, record.branch, record.index);
        if let Some(&idx) = self.by_path.get(&path) {
            return &self.records[idx];
        }
        let idx = self.records.len();
        self.by_hash.insert(record.address.hash(), idx);
        self.by_path.insert(path, idx);
        self.records.push(record);
        &self.records[idx]
    }

    /// Look up the owner of a 20-byte output commitment.
    pub fn by_hash(&self, hash: &Hash160) -> Option<&AddressRecord> {
        self.by_hash.get(hash).map(|&idx| &self.records[idx])
    }

    /// Look up a record by derivation path.
    pub fn by_path(&self, account: u32, branch: Branch, index: u32) -> Option<&AddressRecord> {
        self.by_path
            .get(&(account, branch, index))
            .map(|&idx| &self.records[idx])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Derive the address record at (branch, index) for an account.
///
/// Pure and deterministic given the account's key set: repeated calls with
/// identical arguments produce byte-identical addresses.
///
/// Multisig accounts whose cosigner set is still incomplete derive
/// key-hash deposit addresses from the wallet's own account key, so funds
/// can be collected while the remaining cosigner keys are gathered. Once
/// initialized, subsequent indices commit to the m-of-n redeem structure.
pub fn derive_record(
    account: &Account,
    branch: Branch,
    index: u32,
    network: Network,
) -> Result<AddressRecord, WalletError> {
    let address = match account.account_type {
        AccountType::Multisig { m, .. } if account.uses_multisig_program(branch, index) => {
            let mut child_keys = Vec::with_capacity(account.cosigners.len());
            for cosigner in &account.cosigners {
                let child = keys::child_public_key(cosigner, branch, index)?;
                child_keys.push(child.serialize());
            }
            let redeem = script::multisig_redeem(m, &child_keys)?;
            Address::from_redeem_script(&redeem, network)
        }
        _ => {
            let child = keys::child_public_key(&account.account_key, branch, index)?;
            Address::from_public_key(&child, network)
        }
    };
    Ok(AddressRecord {
        account: account.index,
        branch,
        index,
        address,
    })
}

/// Input script byte length and witness slot count for spending a coin
/// owned by `record`, given its account. Known before any signature
/// exists; this is what keeps templated fees exact.
pub fn spend_shape(account: &Account, record: &AddressRecord) -> (usize, usize) {
    match record.address.kind() {
        AddressKind::KeyHash => (script::SINGLE_SIG_INPUT_LEN, 1),
        AddressKind::ScriptHash => {
            let (m, n) = match account.account_type {
                AccountType::Multisig { m, n } => (m as usize, n as usize),
                // A script-hash record can only come from a multisig account.
                AccountType::SingleSig => (1, 1),
            };
            (script::multisig_input_len(m, n), m)
        }
    }
}
