//! Balance projection
//!
//! Folds the store into `{confirmed, pending incoming, pending outgoing}`
//! balances. The projection is maintained incrementally by the engine on
//! every committed mutation, and can also be recomputed from scratch from
//! the store alone; the two paths must agree (checked by [`Ledger::audit_balances`]
//! and the property tests).
//!
//! [`Ledger::audit_balances`]: crate::Ledger::audit_balances

use crate::store::LedgerStore;
use crate::types::{Direction, EntryStatus, StatusClass};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Materialized wallet balances, in satoshis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    /// Net settled balance (signed: incoming minus outgoing)
    pub confirmed_sats: i64,
    /// Incoming amounts not yet settled
    pub pending_incoming_sats: u64,
    /// Outgoing amounts not yet settled
    pub pending_outgoing_sats: u64,
}

impl Balances {
    fn apply(&mut self, direction: Direction, amount_sats: u64, class: StatusClass, sign: i64) {
        let signed = match direction {
            Direction::Incoming => amount_sats as i64,
            Direction::Outgoing => -(amount_sats as i64),
        };
        match class {
            StatusClass::Settled => self.confirmed_sats += sign * signed,
            StatusClass::Unsettled => match direction {
                Direction::Incoming => {
                    self.pending_incoming_sats = self
                        .pending_incoming_sats
                        .saturating_add_signed(sign * amount_sats as i64);
                }
                Direction::Outgoing => {
                    self.pending_outgoing_sats = self
                        .pending_outgoing_sats
                        .saturating_add_signed(sign * amount_sats as i64);
                }
            },
            StatusClass::Failed => {}
        }
    }
}

/// Incrementally maintained balance projection
#[derive(Debug, Default)]
pub struct BalanceProjector {
    current: Mutex<Balances>,
}

impl BalanceProjector {
    /// Create a zeroed projector
    pub fn new() -> Self {
        Self::default()
    }

    /// Current balances
    pub fn snapshot(&self) -> Balances {
        *self.current.lock()
    }

    /// Account for a newly inserted entry
    pub fn record_insert(&self, direction: Direction, amount_sats: u64, status: EntryStatus) {
        self.current
            .lock()
            .apply(direction, amount_sats, status.class(), 1);
    }

    /// Account for a status change on an existing entry
    ///
    /// A change within the same class (e.g. Confirmed(1) → Confirmed(2))
    /// nets to zero but is applied symmetrically anyway, keeping this path
    /// trivially equivalent to a recompute.
    pub fn record_status_change(
        &self,
        direction: Direction,
        amount_sats: u64,
        old: EntryStatus,
        new: EntryStatus,
    ) {
        let mut current = self.current.lock();
        current.apply(direction, amount_sats, old.class(), -1);
        current.apply(direction, amount_sats, new.class(), 1);
    }

    /// Zero the projection (wallet reset)
    pub fn reset(&self) {
        *self.current.lock() = Balances::default();
    }

    /// Full recomputation from the store alone; the drift-free reference
    pub fn recompute(store: &LedgerStore) -> Balances {
        let mut balances = Balances::default();
        store.for_each(|entry| {
            balances.apply(entry.direction, entry.amount_sats, entry.status.class(), 1);
        });
        balances
    }
}
