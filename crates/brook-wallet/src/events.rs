//! Wallet event dispatch.
//!
//! After every ledger mutation the wallet publishes, per affected account
//! and in this order: an address-exposed event (only when a receive or
//! change cursor advanced), a balance-changed event (always), and a
//! transaction-detail event. Subscribers receive events over unbounded
//! channels, so delivery is asynchronous relative to the mutating call
//! while ordering within one account's stream is preserved. No ordering is
//! guaranteed across accounts.

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use brook_core::address::Address;
use brook_core::types::Hash256;

use crate::balance::Balance;
use crate::keys::Branch;

/// What happened to a transaction from the wallet's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxEventKind {
    /// Entered the ledger as unconfirmed or confirmed.
    Seen,
    /// Transitioned to confirmed at a height.
    Confirmed { height: u64 },
    /// Reversed by a conflict.
    Evicted,
}

/// Notification published to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    /// A new current address was exposed on a branch.
    AddressExposed {
        account: u32,
        branch: Branch,
        index: u32,
        address: Address,
    },
    /// An account's recomputed balance after a mutation.
    BalanceChanged { account: u32, balance: Balance },
    /// Transaction summary for a mutation.
    Transaction {
        account: u32,
        txid: Hash256,
        kind: TxEventKind,
    },
}

/// Fan-out registry of event subscribers.
///
/// Senders that report a closed receiver are pruned on the next publish.
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: Mutex<Vec<UnboundedSender<WalletEvent>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> UnboundedReceiver<WalletEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Publish the ordered event set for one account's mutation:
    /// address-exposed (if any) -> balance-changed -> transaction-detail.
    pub fn notify_mutation(
        &self,
        account: u32,
        exposed: Option<(Branch, u32, Address)>,
        balance: Balance,
        txid: Hash256,
        kind: TxEventKind,
    ) {
        if let Some((branch, index, address)) = exposed {
            self.publish(WalletEvent::AddressExposed {
                account,
                branch,
                index,
                address,
            });
        }
        self.publish(WalletEvent::BalanceChanged { account, balance });
        self.publish(WalletEvent::Transaction { account, txid, kind });
    }

    /// Publish a transaction-detail event on its own (conflict cascades
    /// report each evicted transaction).
    pub fn notify_transaction(&self, account: u32, txid: Hash256, kind: TxEventKind) {
        self.publish(WalletEvent::Transaction { account, txid, kind });
    }

    /// Publish a standalone address exposure (explicit derivation).
    pub fn notify_address(&self, account: u32, branch: Branch, index: u32, address: Address) {
        self.publish(WalletEvent::AddressExposed {
            account,
            branch,
            index,
            address,
        });
    }

    fn publish(&self, event: WalletEvent) {
        self.subscribers
            .lock()
            .retain(|sub| sub.send(event.clone()).is_ok());
    }
}
