//! Reconciliation engine
//!
//! The single authority that turns a normalized delta into a committed
//! store mutation. Every invariant lives here: id-keyed deduplication,
//! the monotonic status graph, confirmation-threshold settlement, and the
//! one sanctioned backward transition (explicit reorg handling).
//!
//! The engine runs inside the apply loop (see [`crate::actor`]), so calls
//! are already serialized; the logic itself is synchronous and never waits
//! on anything external.

use crate::balance::BalanceProjector;
use crate::metrics::Metrics;
use crate::store::LedgerStore;
use crate::types::{
    BlockRef, EntryDelta, EntryId, EntryStatus, LedgerEntry, RailDetail, ReorgEvent, Txid,
};
use crate::view::LedgerChange;
use crate::{Error, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Result of applying one delta
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new entry was created
    Inserted(EntryId),
    /// An existing entry advanced status
    Updated {
        /// Entry id
        id: EntryId,
        /// Status before the merge
        old: EntryStatus,
        /// Status after the merge
        new: EntryStatus,
    },
    /// The delta carried nothing new (or only metadata); no status change
    Unchanged(EntryId),
}

impl ApplyOutcome {
    /// The entry the outcome refers to
    pub fn id(&self) -> EntryId {
        match self {
            ApplyOutcome::Inserted(id)
            | ApplyOutcome::Updated { id, .. }
            | ApplyOutcome::Unchanged(id) => *id,
        }
    }
}

/// Result of processing a reorg notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorgOutcome {
    /// Entries reverted to Pending
    pub reverted: Vec<EntryId>,
    /// Entries failed as conclusively double-spent
    pub failed: Vec<EntryId>,
    /// Invalidated blocks matching no entry (store untouched for these)
    pub unknown_blocks: Vec<BlockRef>,
    /// Double-spent txids matching no entry
    pub unknown_txids: Vec<Txid>,
}

/// Applies normalized deltas to the store, enforcing all entry invariants
#[derive(Debug)]
pub struct ReconciliationEngine {
    store: Arc<LedgerStore>,
    projector: Arc<BalanceProjector>,
    notifier: broadcast::Sender<LedgerChange>,
    metrics: Metrics,
    confirmation_threshold: u32,
}

impl ReconciliationEngine {
    /// Create an engine over the shared store and projector
    pub fn new(
        store: Arc<LedgerStore>,
        projector: Arc<BalanceProjector>,
        notifier: broadcast::Sender<LedgerChange>,
        metrics: Metrics,
        confirmation_threshold: u32,
    ) -> Self {
        Self {
            store,
            projector,
            notifier,
            metrics,
            confirmation_threshold,
        }
    }

    /// Apply one normalized delta: insert if the id is unseen, otherwise
    /// merge under the monotonic transition rules
    pub fn apply(&self, delta: EntryDelta) -> Result<ApplyOutcome> {
        let status = self.promote(delta.status);

        let outcome = match self.store.get(&delta.id) {
            None => self.insert(delta, status),
            Some(existing) => self.merge(existing, delta, status),
        };

        match &outcome {
            Ok(_) => self.metrics.record_delta_applied(),
            Err(e) => self.metrics.record_delta_rejected(e),
        }
        self.metrics
            .observe_store(self.store.len(), self.projector.snapshot().confirmed_sats);

        outcome
    }

    /// Process an explicit reorg notification
    ///
    /// Entries confirmed in an invalidated block revert to Pending; entries
    /// whose txid is conclusively double-spent go to Failed (terminal).
    /// Block refs and txids matching no entry are reported back, logged,
    /// and leave the store unchanged.
    pub fn apply_reorg(&self, event: ReorgEvent) -> Result<ReorgOutcome> {
        if event.invalidated_blocks.is_empty() && event.double_spent.is_empty() {
            self.metrics
                .record_delta_rejected(&Error::MalformedEvent(String::new()));
            return Err(Error::MalformedEvent(
                "reorg notification names no blocks or transactions".to_string(),
            ));
        }

        let invalidated: HashSet<BlockRef> = event.invalidated_blocks.iter().copied().collect();
        let double_spent: HashSet<Txid> = event.double_spent.iter().copied().collect();

        let mut affected = self.store.collect_matching(|entry| {
            matches!(
                &entry.detail,
                RailDetail::OnChain { txid, block_ref, .. }
                    if double_spent.contains(txid)
                        || block_ref.map_or(false, |b| invalidated.contains(&b))
            )
        });
        // Deterministic processing and notification order
        affected.sort_by_key(|entry| entry.id);

        let mut outcome = ReorgOutcome::default();
        let mut matched_blocks: HashSet<BlockRef> = HashSet::new();
        let mut matched_txids: HashSet<Txid> = HashSet::new();

        for mut entry in affected {
            let (txid, conclusively_spent) = match &entry.detail {
                RailDetail::OnChain { txid, block_ref, .. } => {
                    if let Some(block) = block_ref {
                        if invalidated.contains(block) {
                            matched_blocks.insert(*block);
                        }
                    }
                    (*txid, double_spent.contains(txid))
                }
                RailDetail::Lightning { .. } => continue,
            };
            if conclusively_spent {
                matched_txids.insert(txid);
            }

            let old = entry.status;
            let new = if conclusively_spent {
                EntryStatus::Failed
            } else {
                EntryStatus::Pending
            };
            if old == new || old == EntryStatus::Failed {
                continue;
            }

            entry.status = new;
            entry.chain_timestamp = None;
            if let RailDetail::OnChain {
                confirmations,
                block_ref,
                ..
            } = &mut entry.detail
            {
                *confirmations = 0;
                *block_ref = None;
            }

            tracing::info!(
                entry_id = %entry.id,
                txid = %txid,
                old_status = %old,
                new_status = %new,
                "Reorg transition"
            );

            let id = entry.id;
            self.store.update(entry.clone());
            self.projector
                .record_status_change(entry.direction, entry.amount_sats, old, new);
            let _ = self.notifier.send(LedgerChange::StatusChanged { id, old, new });

            if conclusively_spent {
                outcome.failed.push(id);
            } else {
                outcome.reverted.push(id);
            }
        }

        outcome.unknown_blocks = event
            .invalidated_blocks
            .iter()
            .filter(|b| !matched_blocks.contains(b))
            .copied()
            .collect();
        outcome.unknown_txids = event
            .double_spent
            .iter()
            .filter(|t| !matched_txids.contains(t))
            .copied()
            .collect();

        for block in &outcome.unknown_blocks {
            tracing::warn!(%block, "Reorg references unknown block");
        }
        for txid in &outcome.unknown_txids {
            tracing::warn!(%txid, "Reorg references unknown txid");
        }

        if outcome.reverted.is_empty() && outcome.failed.is_empty() {
            let err = Error::UnknownReorgTarget(format!(
                "{} block(s) and {} txid(s) matched no entry",
                outcome.unknown_blocks.len(),
                outcome.unknown_txids.len()
            ));
            self.metrics.record_delta_rejected(&err);
            return Err(err);
        }

        self.metrics.record_reorg();
        self.metrics
            .observe_store(self.store.len(), self.projector.snapshot().confirmed_sats);
        Ok(outcome)
    }

    /// Wallet reset: drop all entries and zero the balances
    pub fn reset(&self) {
        let dropped = self.store.len();
        self.store.reset();
        self.projector.reset();
        self.metrics.observe_store(0, 0);
        let _ = self.notifier.send(LedgerChange::Reset);
        tracing::info!(dropped, "Wallet reset");
    }

    /// Promote a confirmed status past the settlement threshold
    fn promote(&self, status: EntryStatus) -> EntryStatus {
        match status {
            EntryStatus::Confirmed(n) if n >= self.confirmation_threshold => EntryStatus::Settled,
            other => other,
        }
    }

    fn insert(&self, delta: EntryDelta, status: EntryStatus) -> Result<ApplyOutcome> {
        let entry = LedgerEntry {
            id: delta.id,
            direction: delta.direction,
            amount_sats: delta.amount_sats,
            counterparty_label: delta.counterparty_label,
            created_at: Utc::now(),
            chain_timestamp: delta.chain_timestamp,
            status,
            detail: delta.detail,
        };

        tracing::debug!(
            entry_id = %entry.id,
            status = %entry.status,
            amount_sats = entry.amount_sats,
            "Entry inserted"
        );

        self.projector
            .record_insert(entry.direction, entry.amount_sats, entry.status);
        let id = entry.id;
        self.store.insert(entry);
        let _ = self.notifier.send(LedgerChange::Added { id });
        Ok(ApplyOutcome::Inserted(id))
    }

    fn merge(
        &self,
        existing: LedgerEntry,
        delta: EntryDelta,
        status: EntryStatus,
    ) -> Result<ApplyOutcome> {
        // Immutable fields must match; a mismatch is a normalizer or source
        // bug, rejected without touching the store.
        if existing.direction != delta.direction
            || existing.amount_sats != delta.amount_sats
            || existing.rail() != delta.detail.rail()
        {
            return Err(Error::ConsistencyViolation(format!(
                "entry {}: immutable fields conflict (existing {:?}/{} sats/{:?}, delta {:?}/{} sats/{:?})",
                existing.id,
                existing.direction,
                existing.amount_sats,
                existing.rail(),
                delta.direction,
                delta.amount_sats,
                delta.detail.rail(),
            )));
        }

        let old = existing.status;
        if status == old {
            return Ok(self.merge_metadata(existing, delta));
        }

        if !old.can_advance_to(&status) {
            tracing::warn!(
                entry_id = %existing.id,
                old_status = %old,
                new_status = %status,
                "Backward status transition dropped"
            );
            return Err(Error::InvalidTransition(format!(
                "entry {}: {} -> {} moves backward outside the reorg path",
                existing.id, old, status
            )));
        }

        let mut updated = existing;
        updated.status = status;
        Self::fold_metadata(&mut updated, delta);

        tracing::debug!(
            entry_id = %updated.id,
            old_status = %old,
            new_status = %status,
            "Entry status advanced"
        );

        let id = updated.id;
        self.projector
            .record_status_change(updated.direction, updated.amount_sats, old, status);
        self.store.update(updated);
        let _ = self.notifier.send(LedgerChange::StatusChanged {
            id,
            old,
            new: status,
        });
        Ok(ApplyOutcome::Updated {
            id,
            old,
            new: status,
        })
    }

    /// Same-status merge: absorb any newly known metadata without a
    /// notification (nothing the feed shows has changed)
    fn merge_metadata(&self, existing: LedgerEntry, delta: EntryDelta) -> ApplyOutcome {
        let id = existing.id;
        let mut updated = existing.clone();
        Self::fold_metadata(&mut updated, delta);

        if updated != existing {
            tracing::debug!(entry_id = %id, "Entry metadata merged");
            self.store.update(updated);
        }
        ApplyOutcome::Unchanged(id)
    }

    /// Fold a delta's metadata into an entry (status already decided)
    fn fold_metadata(entry: &mut LedgerEntry, delta: EntryDelta) {
        if delta.chain_timestamp.is_some() {
            entry.chain_timestamp = delta.chain_timestamp;
        }
        if entry.counterparty_label.is_none() {
            entry.counterparty_label = delta.counterparty_label;
        }
        match (&mut entry.detail, delta.detail) {
            (
                RailDetail::OnChain {
                    confirmations,
                    block_ref,
                    ..
                },
                RailDetail::OnChain {
                    confirmations: new_confirmations,
                    block_ref: new_block_ref,
                    ..
                },
            ) => {
                // Depth keeps growing even after Settled
                if new_confirmations > *confirmations {
                    *confirmations = new_confirmations;
                }
                if new_block_ref.is_some() {
                    *block_ref = new_block_ref;
                }
            }
            (
                RailDetail::Lightning { preimage, .. },
                RailDetail::Lightning {
                    preimage: new_preimage,
                    ..
                },
            ) => {
                if preimage.is_none() {
                    *preimage = new_preimage;
                }
            }
            // Rail mismatch is rejected before this point
            _ => {}
        }
    }
}
