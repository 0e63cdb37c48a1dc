//! The UTXO ledger: owned coins, their confirmation state, and the spend
//! journal that makes conflict eviction reversible.
//!
//! The ledger exclusively owns [`Coin`] lifetime. Ingesting a transaction
//! credits coins for every output paying a tracked address and retires
//! coins consumed by its inputs; retired coins are parked in a spend
//! journal (not destroyed) until the spending transaction confirms, so a
//! conflict can restore them. Eviction of an unconfirmed transaction
//! cascades through everything downstream that spent its outputs;
//! confirmed entries are never evicted.
//!
//! Every mutation returns a [`MutationReport`] so the wallet can recompute
//! balances and notify listeners; the ledger itself never computes
//! balances incrementally.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use brook_core::params::ConsensusParams;
use brook_core::script;
use brook_core::types::{Hash256, OutPoint, Transaction};

use crate::account::AddressBook;
use crate::error::WalletError;
use crate::keys::Branch;

/// Confirmation state of a coin or transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConfirmationState {
    Unconfirmed,
    Confirmed { height: u64 },
}

impl ConfirmationState {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ConfirmationState::Confirmed { .. })
    }
}

/// An unspent output credited to a tracked address.
#[derive(Clone, Debug)]
pub struct Coin {
    pub outpoint: OutPoint,
    /// Value in drips.
    pub value: u64,
    /// The locking script of the output.
    pub script: Vec<u8>,
    /// Owning address record path.
    pub account: u32,
    pub branch: Branch,
    pub address_index: u32,
    pub state: ConfirmationState,
    pub coinbase: bool,
    /// Ingestion sequence of the creating transaction; selection order.
    pub sequence: u64,
}

impl Coin {
    /// Coinbase outputs need `coinbase_maturity` confirmations; everything
    /// else is always mature.
    pub fn is_mature(&self, tip_height: u64, params: &ConsensusParams) -> bool {
        if !self.coinbase {
            return true;
        }
        match self.state {
            ConfirmationState::Unconfirmed => params.coinbase_maturity == 0,
            ConfirmationState::Confirmed { height } => {
                tip_height.saturating_sub(height) >= params.coinbase_maturity
            }
        }
    }

    /// Whether the coin may fund a spend right now. Unconfirmed coins are
    /// spendable; immature coinbase coins are not.
    pub fn is_spendable(&self, tip_height: u64, params: &ConsensusParams) -> bool {
        self.is_mature(tip_height, params)
    }

    /// Counts toward the confirmed balance: confirmed and, for coinbase,
    /// past maturity.
    pub fn counts_confirmed(&self, tip_height: u64, params: &ConsensusParams) -> bool {
        self.state.is_confirmed() && self.is_mature(tip_height, params)
    }
}

/// A coin retired by an unconfirmed spend, kept for conflict restoration.
#[derive(Clone, Debug)]
struct SpentCoin {
    coin: Coin,
    spent_by: Hash256,
}

/// A tracked transaction and its confirmation state.
#[derive(Clone, Debug)]
pub struct TxRecord {
    pub txid: Hash256,
    pub tx: Transaction,
    pub state: ConfirmationState,
    pub sequence: u64,
    /// Total input minus total output value, when every input is an owned
    /// coin; `None` when foreign inputs make the fee unknowable.
    pub fee: Option<u64>,
}

/// What a mutation touched; drives balance recomputation and events.
#[derive(Clone, Debug, Default)]
pub struct MutationReport {
    pub txid: Hash256,
    /// Accounts whose coin set changed.
    pub accounts: BTreeSet<u32>,
    /// Address records that received new coins (ingest only).
    pub funded: Vec<(u32, Branch, u32)>,
    /// Transactions evicted by conflict cascade, children before parents.
    pub evicted: Vec<Hash256>,
}

/// Outcome of feeding a transaction into the ledger.
#[derive(Clone, Debug)]
pub enum IngestOutcome {
    /// The unspent set changed.
    Applied(MutationReport),
    /// Same transaction in the same confirmation state; no-op.
    Duplicate,
    /// The transaction touches nothing this wallet tracks.
    Irrelevant,
    /// An input is already consumed by a confirmed transaction.
    Rejected(Hash256),
}

/// Owned-coin ledger with spend journal and conflict handling.
#[derive(Default)]
pub struct Ledger {
    coins: HashMap<OutPoint, Coin>,
    spent: HashMap<OutPoint, SpentCoin>,
    txs: HashMap<Hash256, TxRecord>,
    next_sequence: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transaction from the chain or mempool into the ledger.
    ///
    /// Idempotent: re-ingesting a known txid in the same state is a no-op.
    /// A known unconfirmed txid arriving with a confirmed state is treated
    /// as a confirmation. An input already spent by another *unconfirmed*
    /// transaction evicts that older transaction (and its descendants)
    /// before this one applies; an input spent by a *confirmed*
    /// transaction rejects this one instead.
    pub fn ingest(
        &mut self,
        tx: &Transaction,
        state: ConfirmationState,
        book: &AddressBook,
    ) -> Result<IngestOutcome, WalletError> {
        let txid = tx.txid()?;

        if let Some(existing) = self.txs.get(&txid) {
            return match (existing.state, state) {
                (ConfirmationState::Unconfirmed, ConfirmationState::Confirmed { height }) => {
                    Ok(match self.confirm(txid, height)? {
                        Some(report) => IngestOutcome::Applied(report),
                        None => IngestOutcome::Duplicate,
                    })
                }
                _ => Ok(IngestOutcome::Duplicate),
            };
        }

        // Double-spend scan before touching anything.
        let mut conflicts: Vec<Hash256> = Vec::new();
        for input in &tx.inputs {
            if let Some(sp) = self.spent.get(&input.previous_output) {
                let spender_confirmed = self
                    .txs
                    .get(&sp.spent_by)
                    .map(|rec| rec.state.is_confirmed())
                    .unwrap_or(false);
                if spender_confirmed {
                    warn!(txid = %txid, conflicting = %sp.spent_by,
                        "rejecting double spend of confirmed input");
                    return Ok(IngestOutcome::Rejected(sp.spent_by));
                }
                if !conflicts.contains(&sp.spent_by) {
                    conflicts.push(sp.spent_by);
                }
            }
        }

        let mut report = MutationReport {
            txid,
            ..MutationReport::default()
        };
        for old in conflicts {
            warn!(txid = %txid, evicting = %old, "unconfirmed conflict; evicting older spend");
            if let Some(evicted) = self.evict(old)? {
                report.accounts.extend(evicted.accounts);
                report.evicted.extend(evicted.evicted);
            }
        }

        let sequence = self.next_sequence;
        let coinbase = tx.is_coinbase();

        // Credit outputs paying tracked addresses.
        let mut created: Vec<Coin> = Vec::new();
        for (vout, output) in tx.outputs.iter().enumerate() {
            let Some(kind) = script::classify_output(&output.script) else {
                continue;
            };
            let Some(record) = book.by_hash(&kind.hash()) else {
                continue;
            };
            created.push(Coin {
                outpoint: OutPoint {
                    txid,
                    index: vout as u64,
                },
                value: output.value,
                script: output.script.clone(),
                account: record.account,
                branch: record.branch,
                address_index: record.index,
                state,
                coinbase,
                sequence,
            });
        }

        // Retire inputs consuming owned coins.
        let mut spent_value: u64 = 0;
        let mut spent_count = 0usize;
        let mut spent_ops: Vec<OutPoint> = Vec::new();
        for input in &tx.inputs {
            if self.coins.contains_key(&input.previous_output) {
                spent_ops.push(input.previous_output.clone());
            }
        }

        if created.is_empty() && spent_ops.is_empty() {
            return Ok(IngestOutcome::Irrelevant);
        }

        for op in &spent_ops {
            let coin = self.coins.remove(op).expect("scanned above");
            report.accounts.insert(coin.account);
            spent_value = spent_value.saturating_add(coin.value);
            spent_count += 1;
            self.spent.insert(
                op.clone(),
                SpentCoin {
                    coin,
                    spent_by: txid,
                },
            );
        }

        for coin in created {
            report.accounts.insert(coin.account);
            report
                .funded
                .push((coin.account, coin.branch, coin.address_index));
            self.coins.insert(coin.outpoint.clone(), coin);
        }

        // Fee is knowable only when we own every input.
        let fee = if !coinbase && spent_count == tx.inputs.len() {
            tx.total_output_value()
                .and_then(|out| spent_value.checked_sub(out))
        } else {
            None
        };

        self.next_sequence += 1;
        self.txs.insert(
            txid,
            TxRecord {
                txid,
                tx: tx.clone(),
                state,
                sequence,
                fee,
            },
        );

        debug!(txid = %txid, accounts = report.accounts.len(), "ingested transaction");
        Ok(IngestOutcome::Applied(report))
    }

    /// Mark a tracked transaction (and the coins it created) confirmed at
    /// `height`. Unknown or already-confirmed transactions are no-ops.
    pub fn confirm(
        &mut self,
        txid: Hash256,
        height: u64,
    ) -> Result<Option<MutationReport>, WalletError> {
        let Some(record) = self.txs.get_mut(&txid) else {
            return Ok(None);
        };
        if record.state.is_confirmed() {
            return Ok(None);
        }
        record.state = ConfirmationState::Confirmed { height };

        let mut report = MutationReport {
            txid,
            ..MutationReport::default()
        };

        for coin in self.coins.values_mut().filter(|c| c.outpoint.txid == txid) {
            coin.state = ConfirmationState::Confirmed { height };
            report.accounts.insert(coin.account);
        }

        // The spends are now final; the journal entries can no longer be
        // needed for conflict restoration.
        let mut retired: Vec<OutPoint> = Vec::new();
        for (op, sp) in &self.spent {
            if sp.spent_by == txid {
                retired.push(op.clone());
            }
        }
        for op in retired {
            if let Some(sp) = self.spent.remove(&op) {
                report.accounts.insert(sp.coin.account);
            }
        }

        debug!(txid = %txid, height, "confirmed transaction");
        Ok(Some(report))
    }

    /// Reverse an unconfirmed transaction's effects: remove the coins it
    /// created (cascading through downstream unconfirmed spenders first)
    /// and restore the coins it spent. Confirmed entries are never
    /// evicted.
    pub fn evict(&mut self, txid: Hash256) -> Result<Option<MutationReport>, WalletError> {
        let Some(record) = self.txs.get(&txid) else {
            return Ok(None);
        };
        if record.state.is_confirmed() {
            warn!(txid = %txid, "refusing to evict confirmed transaction");
            return Ok(None);
        }
        let output_count = record.tx.outputs.len();

        let mut report = MutationReport {
            txid,
            ..MutationReport::default()
        };

        // Cascade: anything that spent one of our outputs goes first.
        for vout in 0..output_count {
            let op = OutPoint {
                txid,
                index: vout as u64,
            };
            let child = self.spent.get(&op).map(|sp| sp.spent_by);
            if let Some(child) = child {
                let child_confirmed = self
                    .txs
                    .get(&child)
                    .map(|rec| rec.state.is_confirmed())
                    .unwrap_or(false);
                if child_confirmed {
                    warn!(txid = %txid, child = %child,
                        "confirmed descendant blocks coin removal; leaving journal entry");
                    continue;
                }
                if let Some(child_report) = self.evict(child)? {
                    report.accounts.extend(child_report.accounts);
                    report.evicted.extend(child_report.evicted);
                }
            }
        }

        // Drop the coins this transaction created.
        for vout in 0..output_count {
            let op = OutPoint {
                txid,
                index: vout as u64,
            };
            if let Some(coin) = self.coins.remove(&op) {
                report.accounts.insert(coin.account);
            }
        }

        // Restore the coins it spent.
        let mut restored: Vec<OutPoint> = Vec::new();
        for (op, sp) in &self.spent {
            if sp.spent_by == txid {
                restored.push(op.clone());
            }
        }
        for op in restored {
            if let Some(sp) = self.spent.remove(&op) {
                report.accounts.insert(sp.coin.account);
                self.coins.insert(op, sp.coin);
            }
        }

        self.txs.remove(&txid);
        report.evicted.push(txid);

        debug!(txid = %txid, "evicted transaction");
        Ok(Some(report))
    }

    /// Whether an outpoint is currently in the unspent set.
    pub fn is_unspent(&self, outpoint: &OutPoint) -> bool {
        self.coins.contains_key(outpoint)
    }

    pub fn coin(&self, outpoint: &OutPoint) -> Option<&Coin> {
        self.coins.get(outpoint)
    }

    /// All unspent coins.
    pub fn unspent(&self) -> impl Iterator<Item = &Coin> {
        self.coins.values()
    }

    /// Unspent coins belonging to one account.
    pub fn unspent_for(&self, account: u32) -> impl Iterator<Item = &Coin> {
        self.coins.values().filter(move |c| c.account == account)
    }

    pub fn tx(&self, txid: &Hash256) -> Option<&TxRecord> {
        self.txs.get(txid)
    }

    pub fn coin_count(&self) -> usize {
        self.coins.len()
    }

    pub fn tx_count(&self) -> usize {
        self.txs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brook_core::address::Network;
    use brook_core::crypto::KeyPair;
    use brook_core::types::{TxInput, TxOutput};

    use crate::account::{Account, AccountType, AddressBook, derive_record};
    use crate::keys::{KeyChain, Seed};

    fn setup() -> (AddressBook, Vec<brook_core::address::Address>) {
        let mut kc = KeyChain::new(Seed::from_bytes([1u8; 32]));
        let key = kc.account_public_key(0).unwrap();
        let account = Account::new("default", 0, AccountType::SingleSig, key).unwrap();
        let mut book = AddressBook::new();
        let mut addrs = Vec::new();
        for i in 0..4 {
            let record = derive_record(&account, Branch::Receive, i, Network::Testnet).unwrap();
            addrs.push(record.address.clone());
            book.insert(record);
        }
        (book, addrs)
    }

    fn deposit_tx(addr: &brook_core::address::Address, values: &[u64]) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput::bare(OutPoint {
                txid: Hash256([0xEE; 32]),
                index: 99,
            })],
            outputs: values
                .iter()
                .map(|&v| TxOutput {
                    value: v,
                    script: addr.script_pubkey(),
                })
                .collect(),
            lock_time: 0,
        }
    }

    fn spend_tx(from: &Transaction, vout: u64, to_script: Vec<u8>, value: u64) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput::bare(OutPoint {
                txid: from.txid().unwrap(),
                index: vout,
            })],
            outputs: vec![TxOutput {
                value,
                script: to_script,
            }],
            lock_time: 0,
        }
    }

    fn applied(outcome: IngestOutcome) -> MutationReport {
        match outcome {
            IngestOutcome::Applied(report) => report,
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[test]
    fn ingest_credits_owned_outputs() {
        let (book, addrs) = setup();
        let mut ledger = Ledger::new();
        let tx = deposit_tx(&addrs[0], &[1000, 2000]);

        let report = applied(
            ledger
                .ingest(&tx, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );
        assert_eq!(ledger.coin_count(), 2);
        assert_eq!(report.funded.len(), 2);
        assert!(report.accounts.contains(&0));
    }

    #[test]
    fn ingest_ignores_foreign_outputs() {
        let (book, _) = setup();
        let mut ledger = Ledger::new();
        let foreign = brook_core::address::Address::from_public_key(
            &KeyPair::generate().public_key(),
            Network::Testnet,
        );
        let tx = deposit_tx(&foreign, &[1000]);

        let outcome = ledger
            .ingest(&tx, ConfirmationState::Unconfirmed, &book)
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::Irrelevant));
        assert_eq!(ledger.coin_count(), 0);
        assert_eq!(ledger.tx_count(), 0);
    }

    #[test]
    fn ingest_idempotent() {
        let (book, addrs) = setup();
        let mut ledger = Ledger::new();
        let tx = deposit_tx(&addrs[0], &[1000]);

        applied(
            ledger
                .ingest(&tx, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );
        let again = ledger
            .ingest(&tx, ConfirmationState::Unconfirmed, &book)
            .unwrap();
        assert!(matches!(again, IngestOutcome::Duplicate));
        assert_eq!(ledger.coin_count(), 1);
    }

    #[test]
    fn ingest_spends_owned_coins() {
        let (book, addrs) = setup();
        let mut ledger = Ledger::new();
        let fund = deposit_tx(&addrs[0], &[5000]);
        applied(
            ledger
                .ingest(&fund, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );

        // Spend the coin entirely to a foreign script.
        let foreign = brook_core::address::Address::from_public_key(
            &KeyPair::generate().public_key(),
            Network::Testnet,
        );
        let spend = spend_tx(&fund, 0, foreign.script_pubkey(), 4500);
        let report = applied(
            ledger
                .ingest(&spend, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );
        assert_eq!(ledger.coin_count(), 0);
        assert!(report.accounts.contains(&0));
        // Fee = 5000 - 4500, knowable because we owned the only input.
        assert_eq!(ledger.tx(&spend.txid().unwrap()).unwrap().fee, Some(500));
    }

    #[test]
    fn confirm_transitions_coins() {
        let (book, addrs) = setup();
        let mut ledger = Ledger::new();
        let tx = deposit_tx(&addrs[0], &[1000]);
        let txid = tx.txid().unwrap();
        applied(
            ledger
                .ingest(&tx, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );

        let report = ledger.confirm(txid, 42).unwrap().unwrap();
        assert!(report.accounts.contains(&0));
        let coin = ledger.unspent().next().unwrap();
        assert_eq!(coin.state, ConfirmationState::Confirmed { height: 42 });
        // Idempotent.
        assert!(ledger.confirm(txid, 42).unwrap().is_none());
    }

    #[test]
    fn confirm_unknown_is_noop() {
        let mut ledger = Ledger::new();
        assert!(ledger.confirm(Hash256([1; 32]), 10).unwrap().is_none());
    }

    #[test]
    fn ingest_confirmed_after_unconfirmed_confirms() {
        let (book, addrs) = setup();
        let mut ledger = Ledger::new();
        let tx = deposit_tx(&addrs[0], &[1000]);
        applied(
            ledger
                .ingest(&tx, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );
        let outcome = ledger
            .ingest(&tx, ConfirmationState::Confirmed { height: 7 }, &book)
            .unwrap();
        applied(outcome);
        assert!(
            ledger
                .tx(&tx.txid().unwrap())
                .unwrap()
                .state
                .is_confirmed()
        );
    }

    #[test]
    fn evict_restores_spent_coins() {
        let (book, addrs) = setup();
        let mut ledger = Ledger::new();
        let fund = deposit_tx(&addrs[0], &[5000]);
        applied(
            ledger
                .ingest(&fund, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );
        ledger.confirm(fund.txid().unwrap(), 1).unwrap();

        let spend = spend_tx(&fund, 0, addrs[1].script_pubkey(), 4000);
        let spend_txid = spend.txid().unwrap();
        applied(
            ledger
                .ingest(&spend, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );
        // The change-like output is ours, original coin retired.
        assert_eq!(ledger.coin_count(), 1);

        let report = ledger.evict(spend_txid).unwrap().unwrap();
        assert_eq!(report.evicted, vec![spend_txid]);
        assert_eq!(ledger.coin_count(), 1);
        let coin = ledger.unspent().next().unwrap();
        assert_eq!(coin.value, 5000);
        // The restored coin kept its confirmed state.
        assert!(coin.state.is_confirmed());
        assert!(ledger.tx(&spend_txid).is_none());
    }

    #[test]
    fn evict_cascades_through_descendants() {
        let (book, addrs) = setup();
        let mut ledger = Ledger::new();
        let fund = deposit_tx(&addrs[0], &[5000]);
        applied(
            ledger
                .ingest(&fund, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );

        // fund -> a -> b, all unconfirmed, all paying ourselves.
        let a = spend_tx(&fund, 0, addrs[1].script_pubkey(), 4500);
        applied(
            ledger
                .ingest(&a, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );
        let b = spend_tx(&a, 0, addrs[2].script_pubkey(), 4000);
        applied(
            ledger
                .ingest(&b, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );
        assert_eq!(ledger.coin_count(), 1);

        let report = ledger.evict(a.txid().unwrap()).unwrap().unwrap();
        // b evicted before a.
        assert_eq!(report.evicted, vec![b.txid().unwrap(), a.txid().unwrap()]);
        // Only the original funding coin remains.
        assert_eq!(ledger.coin_count(), 1);
        assert_eq!(ledger.unspent().next().unwrap().value, 5000);
    }

    #[test]
    fn evict_confirmed_refused() {
        let (book, addrs) = setup();
        let mut ledger = Ledger::new();
        let tx = deposit_tx(&addrs[0], &[1000]);
        let txid = tx.txid().unwrap();
        applied(
            ledger
                .ingest(&tx, ConfirmationState::Confirmed { height: 3 }, &book)
                .unwrap(),
        );
        assert!(ledger.evict(txid).unwrap().is_none());
        assert_eq!(ledger.coin_count(), 1);
    }

    #[test]
    fn unconfirmed_double_spend_evicts_older() {
        let (book, addrs) = setup();
        let mut ledger = Ledger::new();
        let fund = deposit_tx(&addrs[0], &[5000]);
        applied(
            ledger
                .ingest(&fund, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );

        let first = spend_tx(&fund, 0, addrs[1].script_pubkey(), 4500);
        applied(
            ledger
                .ingest(&first, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );

        // A conflicting spend of the same outpoint arrives.
        let second = spend_tx(&fund, 0, addrs[2].script_pubkey(), 4400);
        let report = applied(
            ledger
                .ingest(&second, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );
        assert!(report.evicted.contains(&first.txid().unwrap()));
        assert!(ledger.tx(&first.txid().unwrap()).is_none());
        assert!(ledger.tx(&second.txid().unwrap()).is_some());
        assert_eq!(ledger.coin_count(), 1);
        assert_eq!(ledger.unspent().next().unwrap().value, 4400);
    }

    #[test]
    fn confirmed_double_spend_rejected() {
        let (book, addrs) = setup();
        let mut ledger = Ledger::new();
        let fund = deposit_tx(&addrs[0], &[5000]);
        applied(
            ledger
                .ingest(&fund, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );

        let first = spend_tx(&fund, 0, addrs[1].script_pubkey(), 4500);
        applied(
            ledger
                .ingest(&first, ConfirmationState::Confirmed { height: 9 }, &book)
                .unwrap(),
        );

        let second = spend_tx(&fund, 0, addrs[2].script_pubkey(), 4400);
        let outcome = ledger
            .ingest(&second, ConfirmationState::Unconfirmed, &book)
            .unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::Rejected(txid) if txid == first.txid().unwrap()
        ));
        assert!(ledger.tx(&second.txid().unwrap()).is_none());
        // The confirmed spend and its output survive untouched.
        assert!(ledger.tx(&first.txid().unwrap()).is_some());
        assert_eq!(ledger.coin_count(), 1);
    }

    #[test]
    fn sequence_orders_ingestion() {
        let (book, addrs) = setup();
        let mut ledger = Ledger::new();
        let tx1 = deposit_tx(&addrs[0], &[100]);
        let tx2 = deposit_tx(&addrs[1], &[200]);
        applied(
            ledger
                .ingest(&tx1, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );
        applied(
            ledger
                .ingest(&tx2, ConfirmationState::Unconfirmed, &book)
                .unwrap(),
        );

        let mut coins: Vec<&Coin> = ledger.unspent().collect();
        coins.sort_by_key(|c| c.sequence);
        assert_eq!(coins[0].value, 100);
        assert_eq!(coins[1].value, 200);
    }

    #[test]
    fn coinbase_maturity_rules() {
        let params = ConsensusParams {
            coinbase_maturity: 100,
            dust_threshold: 0,
        };
        let coin = Coin {
            outpoint: OutPoint {
                txid: Hash256([1; 32]),
                index: 0,
            },
            value: 50,
            script: vec![],
            account: 0,
            branch: Branch::Receive,
            address_index: 0,
            state: ConfirmationState::Confirmed { height: 10 },
            coinbase: true,
            sequence: 0,
        };
        assert!(!coin.is_spendable(50, &params));
        assert!(coin.is_spendable(110, &params));
        assert!(coin.counts_confirmed(110, &params));
        assert!(!coin.counts_confirmed(50, &params));

        // Maturity 0 disables the rule.
        let permissive = ConsensusParams::permissive();
        assert!(coin.is_spendable(10, &permissive));
    }
}
