//! Wallet composition: accounts, ledger, balances, builds, and events.
//!
//! The [`Wallet`] owns every account and coin record behind one
//! `RwLock`. State mutation (ledger ingestion, cursor advancement,
//! spend preparation) is serialized through the write lock so two
//! concurrent spend requests can never select the same coin; balance
//! reads take the read lock and always observe a consistent snapshot.
//! Event listeners are notified after each mutation while the lock is
//! still held, which is what guarantees per-account event ordering.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::debug;

use brook_core::address::{Address, Network};
use brook_core::constants::ADDRESS_LOOKAHEAD;
use brook_core::crypto::PublicKey;
use brook_core::params::ConsensusParams;
use brook_core::script::{self, ScriptKind};
use brook_core::types::{Hash256, Transaction, TxOutput, WITNESS_SIG_LEN, varint_len};

use crate::account::{Account, AccountInfo, AccountType, AddressBook, derive_record};
use crate::balance::{Balance, balance_of};
use crate::builder::{self, BuildMode, ChangeOutput, PendingTransaction, SpendPlan};
use crate::coin_selection::{self, SpendableCoin};
use crate::error::WalletError;
use crate::events::{EventDispatcher, TxEventKind, WalletEvent};
use crate::keys::{Branch, KeyChain, Seed};
use crate::ledger::{ConfirmationState, IngestOutcome, Ledger, MutationReport};
use crate::mnemonic;

/// Magic bytes identifying a Brook wallet file.
pub const WALLET_MAGIC: &[u8; 4] = b"BRWL";

/// Current wallet file format version.
pub const WALLET_VERSION: u32 = 1;

/// Summary of a tracked transaction, for the RPC layer.
#[derive(Clone, Debug)]
pub struct TransactionDetail {
    pub txid: Hash256,
    pub state: ConfirmationState,
    /// Known only when every input was an owned coin.
    pub fee: Option<u64>,
    pub tx: Transaction,
}

/// Wallet file header serialized as JSON.
#[derive(serde::Serialize, serde::Deserialize)]
struct WalletFileHeader {
    magic: String,
    version: u32,
}

/// Persisted wallet payload: the seed plus account structure. Coins are
/// not persisted; they are rebuilt from the ledger feed.
#[derive(serde::Serialize, serde::Deserialize)]
struct WalletData {
    seed: [u8; 32],
    network: Network,
    accounts: Vec<AccountData>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct AccountData {
    name: String,
    index: u32,
    account_type: AccountType,
    cosigners: Vec<PublicKey>,
    multisig_from: Option<(u32, u32)>,
    receive_index: u32,
    change_index: u32,
}

/// Everything behind the wallet lock.
struct WalletState {
    keychain: KeyChain,
    accounts: Vec<Account>,
    names: HashMap<String, u32>,
    book: AddressBook,
    ledger: Ledger,
    tip_height: u64,
}

impl WalletState {
    fn resolve(&self, name: &str) -> Result<u32, WalletError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| WalletError::UnknownAccount(name.to_string()))
    }

    /// Derive (or fetch) the record at a path, returning its address.
    fn ensure_record(
        &mut self,
        account: u32,
        branch: Branch,
        index: u32,
        network: Network,
    ) -> Result<Address, WalletError> {
        if let Some(record) = self.book.by_path(account, branch, index) {
            return Ok(record.address.clone());
        }
        let record = derive_record(&self.accounts[account as usize], branch, index, network)?;
        Ok(self.book.insert(record).address.clone())
    }

    /// Pre-derive records up to cursor + lookahead on both branches so
    /// deposits to not-yet-handed-out addresses are recognized.
    ///
    /// Multisig accounts still collecting cosigner keys are skipped: their
    /// program is not final yet, so records are derived only on demand.
    fn ensure_lookahead(&mut self, account: u32, network: Network) -> Result<(), WalletError> {
        let acct = &self.accounts[account as usize];
        if matches!(acct.account_type, AccountType::Multisig { .. }) && !acct.initialized() {
            return Ok(());
        }
        for branch in [Branch::Receive, Branch::Change] {
            let upto = self.accounts[account as usize]
                .cursor(branch)
                .saturating_add(ADDRESS_LOOKAHEAD);
            for index in 0..upto {
                if self.book.by_path(account, branch, index).is_none() {
                    let record =
                        derive_record(&self.accounts[account as usize], branch, index, network)?;
                    self.book.insert(record);
                }
            }
        }
        Ok(())
    }

    /// Spendable coins of an account with their exact input sizes.
    fn spendable_coins(
        &self,
        account: u32,
        params: &ConsensusParams,
    ) -> Result<Vec<SpendableCoin>, WalletError> {
        let acct = &self.accounts[account as usize];
        let mut spendable = Vec::new();
        for coin in self.ledger.unspent_for(account) {
            if !coin.is_spendable(self.tip_height, params) {
                continue;
            }
            spendable.push(SpendableCoin {
                outpoint: coin.outpoint.clone(),
                value: coin.value,
                sequence: coin.sequence,
                input_size: input_size_for(acct, &coin.script)?,
            });
        }
        Ok(spendable)
    }
}

/// Serialized input length for spending a coin with the given locking
/// script, before any signature exists.
fn input_size_for(account: &Account, locking_script: &[u8]) -> Result<usize, WalletError> {
    let kind = script::classify_output(locking_script)
        .ok_or_else(|| WalletError::BuildError("untracked locking script".into()))?;
    Ok(match kind {
        ScriptKind::KeyHash(_) => {
            32 + 8
                + varint_len(script::SINGLE_SIG_INPUT_LEN as u64)
                + script::SINGLE_SIG_INPUT_LEN
                + varint_len(1)
                + WITNESS_SIG_LEN
        }
        ScriptKind::ScriptHash(_) => {
            let (m, n) = match account.account_type {
                AccountType::Multisig { m, n } => (m as usize, n as usize),
                AccountType::SingleSig => (1, 1),
            };
            let script_len = script::multisig_input_len(m, n);
            32 + 8
                + varint_len(script_len as u64)
                + script_len
                + varint_len(m as u64)
                + WITNESS_SIG_LEN * m
        }
    })
}

/// The wallet engine: key accounts, UTXO tracking, and builds.
pub struct Wallet {
    state: RwLock<WalletState>,
    dispatcher: EventDispatcher,
    params: ConsensusParams,
    network: Network,
}

impl Wallet {
    /// Create a new wallet with a random seed and a `default` account.
    pub fn create(network: Network, params: ConsensusParams) -> Result<Self, WalletError> {
        Self::from_seed(Seed::generate(), network, params)
    }

    /// Create a wallet from an existing seed (deterministic recovery).
    pub fn from_seed(
        seed: Seed,
        network: Network,
        params: ConsensusParams,
    ) -> Result<Self, WalletError> {
        let mut keychain = KeyChain::new(seed);
        let key = keychain.account_public_key(0)?;
        let account = Account::new("default", 0, AccountType::SingleSig, key)?;

        let mut names = HashMap::new();
        names.insert("default".to_string(), 0);

        let mut state = WalletState {
            keychain,
            accounts: vec![account],
            names,
            book: AddressBook::new(),
            ledger: Ledger::new(),
            tip_height: 0,
        };
        state.ensure_lookahead(0, network)?;

        Ok(Self {
            state: RwLock::new(state),
            dispatcher: EventDispatcher::new(),
            params,
            network,
        })
    }

    /// Restore a wallet from a BIP-39 phrase.
    pub fn from_mnemonic(
        phrase: &str,
        network: Network,
        params: ConsensusParams,
    ) -> Result<Self, WalletError> {
        Self::from_seed(mnemonic::mnemonic_to_seed(phrase)?, network, params)
    }

    /// The 24-word backup phrase for this wallet's seed.
    pub fn mnemonic(&self) -> String {
        mnemonic::seed_to_mnemonic(self.state.read().keychain.seed())
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn params(&self) -> ConsensusParams {
        self.params
    }

    /// Height of the best known block, fed by confirmations.
    pub fn tip_height(&self) -> u64 {
        self.state.read().tip_height
    }

    /// Register a new event subscriber.
    pub fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<WalletEvent> {
        self.dispatcher.subscribe()
    }

    // --- Accounts ---

    /// Create an account. The account index is the creation order;
    /// `default` occupies index 0.
    pub fn create_account(
        &self,
        name: &str,
        account_type: AccountType,
    ) -> Result<AccountInfo, WalletError> {
        let mut state = self.state.write();
        if state.names.contains_key(name) {
            return Err(WalletError::DuplicateAccount(name.to_string()));
        }
        let index = state.accounts.len() as u32;
        let key = state.keychain.account_public_key(index)?;
        let account = Account::new(name, index, account_type, key)?;
        let info = account.info();
        state.accounts.push(account);
        state.names.insert(name.to_string(), index);
        state.ensure_lookahead(index, self.network)?;
        debug!(name, index, "created account");
        Ok(info)
    }

    /// Register a cosigner key on a multisig account.
    pub fn add_cosigner(&self, name: &str, key: PublicKey) -> Result<AccountInfo, WalletError> {
        let mut state = self.state.write();
        let index = state.resolve(name)?;
        state.accounts[index as usize].add_cosigner(key)?;
        if state.accounts[index as usize].initialized() {
            state.ensure_lookahead(index, self.network)?;
        }
        Ok(state.accounts[index as usize].info())
    }

    /// Account summary by name.
    pub fn account(&self, name: &str) -> Result<AccountInfo, WalletError> {
        let state = self.state.read();
        let index = state.resolve(name)?;
        Ok(state.accounts[index as usize].info())
    }

    /// Summaries of every account, in index order.
    pub fn list_accounts(&self) -> Vec<AccountInfo> {
        self.state.read().accounts.iter().map(|a| a.info()).collect()
    }

    /// The wallet's account-level public key, to hand to cosigners.
    pub fn account_public_key(&self, name: &str) -> Result<PublicKey, WalletError> {
        let mut state = self.state.write();
        let index = state.resolve(name)?;
        state.keychain.account_public_key(index)
    }

    // --- Addresses ---

    /// Advance the receive branch and return the newly exposed address.
    pub fn next_receive_address(&self, name: &str) -> Result<Address, WalletError> {
        let mut state = self.state.write();
        let account = state.resolve(name)?;
        let index = state.accounts[account as usize].advance(Branch::Receive)?;
        let address = state.ensure_record(account, Branch::Receive, index, self.network)?;
        state.ensure_lookahead(account, self.network)?;
        self.dispatcher
            .notify_address(account, Branch::Receive, index, address.clone());
        Ok(address)
    }

    /// The current (not yet funded) receive address without advancing.
    pub fn current_receive_address(&self, name: &str) -> Result<Address, WalletError> {
        let mut state = self.state.write();
        let account = state.resolve(name)?;
        let index = state.accounts[account as usize].cursor(Branch::Receive);
        state.ensure_record(account, Branch::Receive, index, self.network)
    }

    // --- Balances ---

    /// Recompute the account balance from the live coin set.
    pub fn get_balance(&self, name: &str) -> Result<Balance, WalletError> {
        let state = self.state.read();
        let account = state.resolve(name)?;
        Ok(balance_of(
            &state.ledger,
            account,
            state.tip_height,
            &self.params,
        ))
    }

    // --- Building and sending ---

    /// Select coins and derive a change address for a spend.
    ///
    /// The change address is burned by this call whether or not the plan
    /// is ever finalized or broadcast; an abandoned plan simply leaves an
    /// unused address behind.
    pub fn prepare_spend(
        &self,
        name: &str,
        outputs: &[(Address, u64)],
        fee_rate: u64,
    ) -> Result<SpendPlan, WalletError> {
        let mut state = self.state.write();
        let account = state.resolve(name)?;

        let change_index = state.accounts[account as usize].advance(Branch::Change)?;
        let change_address =
            state.ensure_record(account, Branch::Change, change_index, self.network)?;
        let change_script = change_address.script_pubkey();
        state.ensure_lookahead(account, self.network)?;

        let targets: Vec<TxOutput> = outputs
            .iter()
            .map(|(address, value)| TxOutput {
                value: *value,
                script: address.script_pubkey(),
            })
            .collect();

        let spendable = state.spendable_coins(account, &self.params)?;
        let selection = coin_selection::select(
            spendable,
            &targets,
            fee_rate,
            self.params.dust_threshold,
            change_script.len(),
        )?;

        let change = (selection.change > 0).then(|| ChangeOutput {
            value: selection.change,
            script: change_script,
            branch: Branch::Change,
            index: change_index,
        });

        Ok(SpendPlan {
            account,
            targets,
            selection,
            change,
            fee_rate,
        })
    }

    /// Finalize a prepared spend into a transaction.
    ///
    /// Re-validates the selection against the live ledger; a coin spent
    /// since preparation fails with `StaleSelection` and the caller
    /// should retry from [`Wallet::prepare_spend`].
    pub fn finalize_spend(
        &self,
        plan: &SpendPlan,
        mode: BuildMode,
    ) -> Result<PendingTransaction, WalletError> {
        let mut state = self.state.write();
        let state = &mut *state;
        builder::finalize(
            plan,
            mode,
            &state.ledger,
            &state.accounts,
            &mut state.keychain,
            0,
        )
    }

    /// Build a transaction for the account in the requested mode.
    pub fn create_tx(
        &self,
        name: &str,
        outputs: &[(Address, u64)],
        fee_rate: u64,
        mode: BuildMode,
    ) -> Result<PendingTransaction, WalletError> {
        let plan = self.prepare_spend(name, outputs, fee_rate)?;
        self.finalize_spend(&plan, mode)
    }

    /// Build, sign, and apply a spend, returning the broadcastable
    /// transaction. The transaction enters the ledger as a new
    /// unconfirmed entry; the network layer owns actual relay.
    pub fn send(
        &self,
        name: &str,
        outputs: &[(Address, u64)],
        fee_rate: u64,
    ) -> Result<PendingTransaction, WalletError> {
        let pending = self.create_tx(name, outputs, fee_rate, BuildMode::Signed)?;
        self.on_transaction_seen(&pending.tx, ConfirmationState::Unconfirmed)?;
        debug!(txid = %pending.txid, fee = pending.fee, "sent transaction");
        Ok(pending)
    }

    // --- Ledger feed ---

    /// Feed a transaction observed in the mempool or a block.
    pub fn on_transaction_seen(
        &self,
        tx: &Transaction,
        confirmation: ConfirmationState,
    ) -> Result<(), WalletError> {
        let mut state = self.state.write();
        if let ConfirmationState::Confirmed { height } = confirmation {
            state.tip_height = state.tip_height.max(height);
        }
        let outcome = {
            let state = &mut *state;
            state.ledger.ingest(tx, confirmation, &state.book)?
        };
        match outcome {
            IngestOutcome::Applied(report) => {
                let kind = match confirmation {
                    ConfirmationState::Unconfirmed => TxEventKind::Seen,
                    ConfirmationState::Confirmed { height } => TxEventKind::Confirmed { height },
                };
                self.post_mutation(&mut state, &report, kind)
            }
            IngestOutcome::Duplicate | IngestOutcome::Irrelevant | IngestOutcome::Rejected(_) => {
                Ok(())
            }
        }
    }

    /// Feed a confirmation for a previously seen transaction.
    pub fn on_transaction_confirmed(
        &self,
        txid: Hash256,
        height: u64,
    ) -> Result<(), WalletError> {
        let mut state = self.state.write();
        state.tip_height = state.tip_height.max(height);
        if let Some(report) = state.ledger.confirm(txid, height)? {
            self.post_mutation(&mut state, &report, TxEventKind::Confirmed { height })?;
        }
        Ok(())
    }

    /// Feed a conflict: a competing transaction consumed one of this
    /// transaction's inputs. Evicts it and everything downstream.
    pub fn on_transaction_conflict(&self, txid: Hash256) -> Result<(), WalletError> {
        let mut state = self.state.write();
        if let Some(report) = state.ledger.evict(txid)? {
            self.post_mutation(&mut state, &report, TxEventKind::Evicted)?;
        }
        Ok(())
    }

    /// Look up a tracked transaction.
    pub fn get_tx(&self, txid: &Hash256) -> Option<TransactionDetail> {
        let state = self.state.read();
        state.ledger.tx(txid).map(|record| TransactionDetail {
            txid: record.txid,
            state: record.state,
            fee: record.fee,
            tx: record.tx.clone(),
        })
    }

    /// Advance cursors for funded records, recompute balances, and
    /// publish the ordered event set for each affected account.
    fn post_mutation(
        &self,
        state: &mut WalletState,
        report: &MutationReport,
        kind: TxEventKind,
    ) -> Result<(), WalletError> {
        let mut exposed: BTreeMap<u32, (Branch, u32, Address)> = BTreeMap::new();
        for (account, branch, index) in &report.funded {
            let moved = state.accounts[*account as usize].advance_past(*branch, *index)?;
            if moved {
                let cursor = state.accounts[*account as usize].cursor(*branch);
                let address = state.ensure_record(*account, *branch, cursor, self.network)?;
                state.ensure_lookahead(*account, self.network)?;
                exposed.insert(*account, (*branch, cursor, address));
            }
        }

        for account in &report.accounts {
            let balance = balance_of(&state.ledger, *account, state.tip_height, &self.params);
            self.dispatcher.notify_mutation(
                *account,
                exposed.remove(account),
                balance,
                report.txid,
                kind,
            );
            for evicted in &report.evicted {
                if *evicted != report.txid {
                    self.dispatcher
                        .notify_transaction(*account, *evicted, TxEventKind::Evicted);
                }
            }
        }
        Ok(())
    }

    // --- Persistence ---

    /// Save the wallet to an encrypted file.
    ///
    /// # File format
    /// ```text
    /// header_len (4 bytes LE) || header_json || encrypted_payload || sha256d checksum (4 bytes)
    /// ```
    /// The header is unencrypted JSON carrying magic bytes and version.
    /// The payload is the Argon2id/AES-256-GCM encrypted wallet data.
    pub fn save_to_file(&self, path: &Path, password: &[u8]) -> Result<(), WalletError> {
        let state = self.state.read();

        let header = WalletFileHeader {
            magic: String::from_utf8_lossy(WALLET_MAGIC).to_string(),
            version: WALLET_VERSION,
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| WalletError::Serialization(e.to_string()))?;

        let data = WalletData {
            seed: *state.keychain.seed().as_bytes(),
            network: self.network,
            accounts: state
                .accounts
                .iter()
                .map(|account| AccountData {
                    name: account.name.clone(),
                    index: account.index,
                    account_type: account.account_type,
                    cosigners: account.cosigners.clone(),
                    multisig_from: account.multisig_from(),
                    receive_index: account.cursor(Branch::Receive),
                    change_index: account.cursor(Branch::Change),
                })
                .collect(),
        };
        let payload =
            serde_json::to_vec(&data).map_err(|e| WalletError::Serialization(e.to_string()))?;
        let encrypted = crate::encryption::encrypt(&payload, password)?;
        let checksum = sha256d(&encrypted);

        let mut file_data =
            Vec::with_capacity(4 + header_json.len() + encrypted.len() + 4);
        file_data.extend_from_slice(&(header_json.len() as u32).to_le_bytes());
        file_data.extend_from_slice(&header_json);
        file_data.extend_from_slice(&encrypted);
        file_data.extend_from_slice(&checksum[..4]);

        std::fs::write(path, &file_data).map_err(|e| WalletError::IoError(e.to_string()))
    }

    /// Load a wallet from an encrypted file.
    ///
    /// Coins are not persisted; replay the ledger feed (or rescan) to
    /// repopulate balances.
    pub fn load_from_file(
        path: &Path,
        password: &[u8],
        params: ConsensusParams,
    ) -> Result<Self, WalletError> {
        let file_data = std::fs::read(path).map_err(|e| WalletError::IoError(e.to_string()))?;

        if file_data.len() < 4 {
            return Err(WalletError::CorruptedFile("file too short".into()));
        }
        let header_len = u32::from_le_bytes(
            file_data[..4].try_into().expect("length checked"),
        ) as usize;
        if file_data.len() < 4 + header_len + 4 {
            return Err(WalletError::CorruptedFile("header truncated".into()));
        }

        let header: WalletFileHeader = serde_json::from_slice(&file_data[4..4 + header_len])
            .map_err(|e| WalletError::CorruptedFile(format!("invalid header: {e}")))?;
        if header.magic != String::from_utf8_lossy(WALLET_MAGIC).as_ref() {
            return Err(WalletError::CorruptedFile("invalid magic bytes".into()));
        }
        if header.version != WALLET_VERSION {
            return Err(WalletError::CorruptedFile(format!(
                "unsupported version: {}",
                header.version
            )));
        }

        let body = &file_data[4 + header_len..];
        let (encrypted, checksum) = body.split_at(body.len() - 4);
        if sha256d(encrypted)[..4] != *checksum {
            return Err(WalletError::CorruptedFile("checksum mismatch".into()));
        }

        let payload = crate::encryption::decrypt(encrypted, password)?;
        let data: WalletData = serde_json::from_slice(&payload)
            .map_err(|e| WalletError::CorruptedFile(format!("invalid payload: {e}")))?;

        let mut keychain = KeyChain::new(Seed::from_bytes(data.seed));
        let mut accounts = Vec::with_capacity(data.accounts.len());
        let mut names = HashMap::new();
        for (position, entry) in data.accounts.iter().enumerate() {
            if entry.index != position as u32 {
                return Err(WalletError::CorruptedFile(format!(
                    "account index {} out of order",
                    entry.index
                )));
            }
            let key = keychain.account_public_key(entry.index)?;
            if !entry.cosigners.contains(&key) {
                return Err(WalletError::CorruptedFile(format!(
                    "account {} cosigner set is missing this wallet's key",
                    entry.name
                )));
            }
            let mut account =
                Account::new(entry.name.clone(), entry.index, entry.account_type, key)?;
            account.cosigners = entry.cosigners.clone();
            account.restore_cursors(
                entry.receive_index,
                entry.change_index,
                entry.multisig_from,
            );
            if names.insert(entry.name.clone(), entry.index).is_some() {
                return Err(WalletError::CorruptedFile(format!(
                    "duplicate account name {}",
                    entry.name
                )));
            }
            accounts.push(account);
        }

        let mut state = WalletState {
            keychain,
            accounts,
            names,
            book: AddressBook::new(),
            ledger: Ledger::new(),
            tip_height: 0,
        };

        // Rebuild the address arena out to each branch cursor (plus
        // lookahead where the account's program is final).
        for account in 0..state.accounts.len() as u32 {
            let eligible = {
                let acct = &state.accounts[account as usize];
                !matches!(acct.account_type, AccountType::Multisig { .. }) || acct.initialized()
            };
            if eligible {
                state.ensure_lookahead(account, data.network)?;
            } else {
                for branch in [Branch::Receive, Branch::Change] {
                    let upto = state.accounts[account as usize].cursor(branch);
                    for index in 0..upto {
                        state.ensure_record(account, branch, index, data.network)?;
                    }
                }
            }
        }

        Ok(Self {
            state: RwLock::new(state),
            dispatcher: EventDispatcher::new(),
            params,
            network: data.network,
        })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Wallet")
            .field("network", &self.network)
            .field("accounts", &state.accounts.len())
            .field("addresses", &state.book.len())
            .field("coins", &state.ledger.coin_count())
            .finish()
    }
}

/// Double SHA-256, used for the wallet file checksum.
fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use brook_core::types::{OutPoint, TxInput};

    fn permissive() -> ConsensusParams {
        ConsensusParams {
            coinbase_maturity: 0,
            dust_threshold: 546,
        }
    }

    fn wallet() -> Wallet {
        Wallet::from_seed(Seed::from_bytes([1u8; 32]), Network::Testnet, permissive()).unwrap()
    }

    fn deposit(wallet: &Wallet, address: &Address, values: &[u64], salt: u8) -> Transaction {
        let tx = Transaction {
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
        };
        wallet
            .on_transaction_seen(&tx, ConfirmationState::Unconfirmed)
            .unwrap();
        tx
    }

    #[test]
    fn new_wallet_has_default_account() {
        let w = wallet();
        let info = w.account("default").unwrap();
        assert_eq!(info.index, 0);
        assert!(info.initialized);
        assert_eq!(w.list_accounts().len(), 1);
    }

    #[test]
    fn account_indices_follow_creation_order() {
        let w = wallet();
        let foo = w.create_account("foo", AccountType::SingleSig).unwrap();
        assert_eq!(foo.index, 1);
        let foo2 = w
            .create_account("foo2", AccountType::Multisig { m: 1, n: 2 })
            .unwrap();
        assert_eq!(foo2.index, 2);
        assert_eq!(foo2.m, 1);
        assert_eq!(foo2.n, 2);
        assert!(!foo2.initialized);
    }

    #[test]
    fn duplicate_account_name_rejected() {
        let w = wallet();
        w.create_account("foo", AccountType::SingleSig).unwrap();
        let err = w.create_account("foo", AccountType::SingleSig).unwrap_err();
        assert!(matches!(err, WalletError::DuplicateAccount(_)));
    }

    #[test]
    fn bad_multisig_config_rejected() {
        let w = wallet();
        let err = w
            .create_account("bad", AccountType::Multisig { m: 3, n: 2 })
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAccountConfig(_)));
    }

    #[test]
    fn unknown_account_rejected() {
        let w = wallet();
        assert!(matches!(
            w.get_balance("nope").unwrap_err(),
            WalletError::UnknownAccount(_)
        ));
    }

    #[test]
    fn receive_addresses_never_repeat() {
        let w = wallet();
        let a0 = w.next_receive_address("default").unwrap();
        let a1 = w.next_receive_address("default").unwrap();
        assert_ne!(a0, a1);
        assert_eq!(w.account("default").unwrap().receive_index, 2);
    }

    #[test]
    fn deposit_within_lookahead_recognized() {
        let w = wallet();
        // Index 5 was never handed out but sits inside the gap window.
        let addr = {
            let mut state = w.state.write();
            state
                .ensure_record(0, Branch::Receive, 5, Network::Testnet)
                .unwrap()
        };
        deposit(&w, &addr, &[7_000], 1);
        assert_eq!(w.get_balance("default").unwrap().unconfirmed, 7_000);
        // The cursor jumped past the funded index.
        assert_eq!(w.account("default").unwrap().receive_index, 6);
    }

    #[test]
    fn deposit_advances_current_receive_address() {
        let w = wallet();
        let addr = w.current_receive_address("default").unwrap();
        deposit(&w, &addr, &[1_000], 1);
        let next = w.current_receive_address("default").unwrap();
        assert_ne!(addr, next);
    }

    #[test]
    fn confirmation_updates_tip_and_balance() {
        let w = wallet();
        let addr = w.next_receive_address("default").unwrap();
        let tx = deposit(&w, &addr, &[5_000], 1);

        w.on_transaction_confirmed(tx.txid().unwrap(), 12).unwrap();
        assert_eq!(w.tip_height(), 12);
        let balance = w.get_balance("default").unwrap();
        assert_eq!(balance.confirmed, 5_000);
        assert_eq!(balance.unconfirmed, 5_000);
    }

    #[test]
    fn conflict_evicts_and_restores() {
        let w = wallet();
        let addr = w.next_receive_address("default").unwrap();
        deposit(&w, &addr, &[50_460], 1);

        let pending = w.send("default", &[(addr.clone(), 10_000)], 10).unwrap();
        assert!(w.get_tx(&pending.txid).is_some());

        w.on_transaction_conflict(pending.txid).unwrap();
        assert!(w.get_tx(&pending.txid).is_none());
        assert_eq!(w.get_balance("default").unwrap().unconfirmed, 50_460);
    }

    #[test]
    fn get_tx_reports_fee_and_state() {
        let w = wallet();
        let addr = w.next_receive_address("default").unwrap();
        deposit(&w, &addr, &[50_460], 1);

        let pending = w.send("default", &[(addr.clone(), 10_000)], 10).unwrap();
        let detail = w.get_tx(&pending.txid).unwrap();
        assert_eq!(detail.fee, Some(pending.fee));
        assert_eq!(detail.state, ConfirmationState::Unconfirmed);
        assert!(w.get_tx(&Hash256([0xAB; 32])).is_none());
    }

    #[test]
    fn mnemonic_roundtrip_restores_addresses() {
        let w = wallet();
        let phrase = w.mnemonic();
        let a0 = w.next_receive_address("default").unwrap();

        let restored = Wallet::from_mnemonic(&phrase, Network::Testnet, permissive()).unwrap();
        let b0 = restored.next_receive_address("default").unwrap();
        assert_eq!(a0, b0);
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wallet");

        let w = wallet();
        w.create_account("foo", AccountType::SingleSig).unwrap();
        let a0 = w.next_receive_address("foo").unwrap();
        let a1 = w.next_receive_address("foo").unwrap();
        w.save_to_file(&path, b"password").unwrap();

        let loaded = Wallet::load_from_file(&path, b"password", permissive()).unwrap();
        assert_eq!(loaded.network(), Network::Testnet);
        let info = loaded.account("foo").unwrap();
        assert_eq!(info.receive_index, 2);

        // Previously exposed addresses are recognized again.
        let state = loaded.state.read();
        assert!(state.book.by_hash(&a0.hash()).is_some());
        assert!(state.book.by_hash(&a1.hash()).is_some());
        drop(state);

        // And the next address continues the sequence.
        let a2_fresh = {
            let w2 = wallet();
            w2.create_account("foo", AccountType::SingleSig).unwrap();
            w2.next_receive_address("foo").unwrap();
            w2.next_receive_address("foo").unwrap();
            w2.next_receive_address("foo").unwrap()
        };
        assert_eq!(loaded.next_receive_address("foo").unwrap(), a2_fresh);
    }

    #[test]
    fn load_wrong_password_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wallet");
        wallet().save_to_file(&path, b"correct").unwrap();

        let err = Wallet::load_from_file(&path, b"wrong", permissive()).unwrap_err();
        assert_eq!(err, WalletError::InvalidPassword);
    }

    #[test]
    fn load_corrupted_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wallet");
        std::fs::write(&path, b"garbage").unwrap();
        let err = Wallet::load_from_file(&path, b"pass", permissive()).unwrap_err();
        assert!(matches!(err, WalletError::CorruptedFile(_)));
    }

    #[test]
    fn load_detects_bit_rot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wallet");
        wallet().save_to_file(&path, b"password").unwrap();

        let mut data = std::fs::read(&path).unwrap();
        let mid = data.len() / 2;
        data[mid] ^= 0xFF;
        std::fs::write(&path, &data).unwrap();

        let err = Wallet::load_from_file(&path, b"password", permissive()).unwrap_err();
        assert!(matches!(
            err,
            WalletError::CorruptedFile(_) | WalletError::InvalidPassword
        ));
    }

    #[test]
    fn save_load_preserves_multisig_activation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wallet");

        let w = wallet();
        w.create_account("shared", AccountType::Multisig { m: 1, n: 2 })
            .unwrap();
        // Hand out a deposit address before the cosigner arrives.
        let early = w.next_receive_address("shared").unwrap();
        let other = Wallet::from_seed(
            Seed::from_bytes([9u8; 32]),
            Network::Testnet,
            permissive(),
        )
        .unwrap();
        let other_key = other.account_public_key("default").unwrap();
        let info = w.add_cosigner("shared", other_key).unwrap();
        assert!(info.initialized);

        w.save_to_file(&path, b"password").unwrap();
        let loaded = Wallet::load_from_file(&path, b"password", permissive()).unwrap();

        // The pre-activation record re-derives as the same single-sig
        // deposit address.
        let state = loaded.state.read();
        assert!(state.book.by_hash(&early.hash()).is_some());
    }

    #[test]
    fn wallet_debug_format() {
        let w = wallet();
        let debug = format!("{w:?}");
        assert!(debug.contains("Wallet"));
        assert!(debug.contains("Testnet"));
    }

    #[test]
    fn events_follow_deposit() {
        let w = wallet();
        let mut rx = w.subscribe();
        let addr = w.current_receive_address("default").unwrap();
        deposit(&w, &addr, &[1_000], 1);

        // Deposit on the current address advances it: address-exposed,
        // then balance, then the transaction itself.
        assert!(matches!(
            rx.try_recv().unwrap(),
            WalletEvent::AddressExposed { account: 0, .. }
        ));
        match rx.try_recv().unwrap() {
            WalletEvent::BalanceChanged { balance, .. } => {
                assert_eq!(balance.unconfirmed, 1_000);
            }
            other => panic!("expected balance event, got {other:?}"),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            WalletEvent::Transaction {
                kind: TxEventKind::Seen,
                ..
            }
        ));
    }
}
