//! Event normalization
//!
//! Converts raw collaborator events (on-chain observations from the
//! node/indexer, payment notifications from the channel manager) into
//! [`EntryDelta`]s the reconciliation engine can apply.
//!
//! Validation is all-or-nothing: a malformed event is rejected before any
//! delta is emitted, so a partially-valid observation never partially
//! applies.

use crate::types::{
    EntryDelta, EntryId, EntryStatus, LightningEvent, LightningStatus, OnChainObservation,
    RailDetail,
};
use crate::{Error, Result};
use std::collections::HashSet;

/// Stateless normalizer for raw collaborator events
///
/// On-chain identity is per wallet-relevant output: each movement in an
/// observation becomes its own delta keyed by `(txid, vout)`. An outgoing
/// net transfer is reported by the collaborator as a single movement on the
/// output that pays the counterparty.
#[derive(Debug, Default)]
pub struct EventNormalizer;

impl EventNormalizer {
    /// Create a normalizer
    pub fn new() -> Self {
        Self
    }

    /// Normalize an on-chain observation into one delta per movement
    pub fn normalize_on_chain(&self, obs: &OnChainObservation) -> Result<Vec<EntryDelta>> {
        if obs.movements.is_empty() {
            return Err(Error::MalformedEvent(format!(
                "on-chain observation {} has no wallet-relevant movements",
                obs.txid
            )));
        }

        if obs.confirmations > 0 && obs.block.is_none() {
            return Err(Error::MalformedEvent(format!(
                "on-chain observation {} reports {} confirmations without a block reference",
                obs.txid, obs.confirmations
            )));
        }

        let mut seen_vouts = HashSet::new();
        for movement in &obs.movements {
            if movement.amount_sats == 0 {
                return Err(Error::MalformedEvent(format!(
                    "on-chain observation {} vout {} has zero amount",
                    obs.txid, movement.vout
                )));
            }
            if !seen_vouts.insert(movement.vout) {
                return Err(Error::MalformedEvent(format!(
                    "on-chain observation {} repeats vout {}",
                    obs.txid, movement.vout
                )));
            }
        }

        let status = if obs.confirmations == 0 {
            EntryStatus::Pending
        } else {
            EntryStatus::Confirmed(obs.confirmations)
        };

        let deltas = obs
            .movements
            .iter()
            .map(|movement| EntryDelta {
                id: EntryId::on_chain(&obs.txid, movement.vout),
                direction: movement.direction,
                amount_sats: movement.amount_sats,
                counterparty_label: movement.label.clone(),
                chain_timestamp: obs.block_time,
                status,
                detail: RailDetail::OnChain {
                    txid: obs.txid,
                    vout: movement.vout,
                    confirmations: obs.confirmations,
                    block_ref: obs.block,
                },
            })
            .collect();

        Ok(deltas)
    }

    /// Normalize a Lightning payment/settlement notification
    pub fn normalize_lightning(&self, event: &LightningEvent) -> Result<EntryDelta> {
        if event.amount_sats == 0 {
            return Err(Error::MalformedEvent(format!(
                "lightning event {} has zero amount",
                event.payment_hash
            )));
        }

        if event.status == LightningStatus::Settled && event.preimage.is_none() {
            return Err(Error::MalformedEvent(format!(
                "lightning event {} reports settlement without a preimage",
                event.payment_hash
            )));
        }

        let status = match event.status {
            LightningStatus::Pending => EntryStatus::Pending,
            LightningStatus::Settled => EntryStatus::Settled,
            LightningStatus::Failed => EntryStatus::Failed,
        };

        Ok(EntryDelta {
            id: EntryId::lightning(&event.payment_hash, event.direction),
            direction: event.direction,
            amount_sats: event.amount_sats,
            counterparty_label: event.label.clone(),
            chain_timestamp: if event.status == LightningStatus::Settled {
                event.settled_at
            } else {
                None
            },
            status,
            detail: RailDetail::Lightning {
                payment_hash: event.payment_hash,
                preimage: event.preimage,
            },
        })
    }
}
