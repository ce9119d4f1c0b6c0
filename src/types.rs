//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic identity (entry ids derived from source data, never random)
//! - Exact arithmetic (integer satoshis, no fractional amounts)
//! - Memory safety (no unsafe code)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// On-chain transaction id (big-endian display, as conventionally printed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Txid([u8; 32]);

impl Txid {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Lightning payment hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaymentHash([u8; 32]);

impl PaymentHash {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PaymentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Lightning settlement preimage (proof of payment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preimage([u8; 32]);

impl Preimage {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Reference to a block on the best chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    /// Block hash
    pub hash: [u8; 32],
    /// Block height
    pub height: u32,
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {} (", self.height)?;
        for b in &self.hash[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "…)")
    }
}

/// Stable entry identity, derived deterministically from source data
///
/// On-chain entries hash `txid || vout` (one entry per wallet-relevant
/// output); Lightning entries hash `payment_hash || direction` so a node
/// that both sends and receives under the same hash cannot collide.
/// Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId([u8; 32]);

impl EntryId {
    /// Derive the id for an on-chain movement
    pub fn on_chain(txid: &Txid, vout: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(txid.as_bytes());
        hasher.update(vout.to_le_bytes());
        Self(hasher.finalize().into())
    }

    /// Derive the id for a Lightning payment
    pub fn lightning(payment_hash: &PaymentHash, direction: Direction) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(payment_hash.as_bytes());
        hasher.update([direction as u8]);
        Self(hasher.finalize().into())
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix is enough to identify an entry in logs
        for b in &self.0[..8] {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Payment rail an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rail {
    /// On-chain Bitcoin transaction
    OnChain,
    /// Lightning Network payment
    Lightning,
}

/// Direction of funds relative to the wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// Funds received
    Incoming = 0,
    /// Funds sent
    Outgoing = 1,
}

/// Entry lifecycle status
///
/// Transitions are monotonic along
/// `Pending → Confirmed(n) → Confirmed(n+1) → … → Settled` or
/// `Pending → Failed`; the only sanctioned backward move is an explicit
/// reorg notification, handled by the reconciliation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Observed but not yet confirmed or settled
    Pending,
    /// On-chain, buried under `n` confirmations (n >= 1)
    Confirmed(u32),
    /// Final: threshold confirmations reached, or Lightning settlement proof held
    Settled,
    /// Terminal failure (Lightning failure or conclusive double-spend)
    Failed,
}

/// Coarse status grouping used by balance projection and feed filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusClass {
    /// Pending or Confirmed below threshold: counted as pending balance
    Unsettled,
    /// Settled: counted as confirmed balance
    Settled,
    /// Failed: excluded from balances
    Failed,
}

impl EntryStatus {
    /// Status class for balance grouping
    pub fn class(&self) -> StatusClass {
        match self {
            EntryStatus::Pending | EntryStatus::Confirmed(_) => StatusClass::Unsettled,
            EntryStatus::Settled => StatusClass::Settled,
            EntryStatus::Failed => StatusClass::Failed,
        }
    }

    /// Check if no further forward transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryStatus::Settled | EntryStatus::Failed)
    }

    /// Check whether advancing to `next` is a valid forward transition
    ///
    /// Equal statuses are not an advance (the merge treats them as a no-op).
    /// `Confirmed → Failed` is excluded here: an on-chain failure only
    /// happens through the reorg path, which bypasses this check.
    pub fn can_advance_to(&self, next: &EntryStatus) -> bool {
        match (self, next) {
            (EntryStatus::Pending, EntryStatus::Confirmed(_))
            | (EntryStatus::Pending, EntryStatus::Settled)
            | (EntryStatus::Pending, EntryStatus::Failed)
            | (EntryStatus::Confirmed(_), EntryStatus::Settled) => true,
            (EntryStatus::Confirmed(n), EntryStatus::Confirmed(m)) => m > n,
            _ => false,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Pending => write!(f, "pending"),
            EntryStatus::Confirmed(n) => write!(f, "confirmed({})", n),
            EntryStatus::Settled => write!(f, "settled"),
            EntryStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Rail-specific entry detail
///
/// A tagged variant over a common entry shape: confirmation tracking only
/// exists on-chain, settlement proofs only on Lightning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RailDetail {
    /// On-chain movement
    OnChain {
        /// Source transaction
        txid: Txid,
        /// Wallet-relevant output index
        vout: u32,
        /// Current confirmation depth (0 = mempool)
        confirmations: u32,
        /// Block the transaction confirmed in, if any
        block_ref: Option<BlockRef>,
    },
    /// Lightning payment
    Lightning {
        /// Payment hash
        payment_hash: PaymentHash,
        /// Settlement proof, present once settled
        preimage: Option<Preimage>,
    },
}

impl RailDetail {
    /// The rail this detail belongs to
    pub fn rail(&self) -> Rail {
        match self {
            RailDetail::OnChain { .. } => Rail::OnChain,
            RailDetail::Lightning { .. } => Rail::Lightning,
        }
    }
}

/// One payment in the unified history, on-chain or Lightning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Stable identity (dedup key)
    pub id: EntryId,

    /// Direction of funds
    pub direction: Direction,

    /// Amount in satoshis (always positive; sign comes from direction)
    pub amount_sats: u64,

    /// Optional free-text counterparty description
    pub counterparty_label: Option<String>,

    /// First-seen timestamp (local; ordering tie-break)
    pub created_at: DateTime<Utc>,

    /// Block time (on-chain) or settlement time (Lightning), once known
    pub chain_timestamp: Option<DateTime<Utc>>,

    /// Lifecycle status
    pub status: EntryStatus,

    /// Rail-specific detail
    pub detail: RailDetail,
}

impl LedgerEntry {
    /// The rail this entry belongs to
    pub fn rail(&self) -> Rail {
        self.detail.rail()
    }

    /// Amount signed by direction (incoming positive, outgoing negative)
    pub fn signed_amount_sats(&self) -> i64 {
        match self.direction {
            Direction::Incoming => self.amount_sats as i64,
            Direction::Outgoing => -(self.amount_sats as i64),
        }
    }

    /// Display ordering key: chain timestamp when known, else first-seen,
    /// ties broken by id
    pub fn sort_key(&self) -> SortKey {
        let ts = self.chain_timestamp.unwrap_or(self.created_at);
        SortKey {
            ts_millis: ts.timestamp_millis(),
            id: self.id,
        }
    }
}

/// Total ordering key for the display feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SortKey {
    /// Display timestamp in epoch milliseconds
    pub ts_millis: i64,
    /// Entry id, as tie-break
    pub id: EntryId,
}

// ---------------------------------------------------------------------------
// Raw collaborator events (inbound interface)
// ---------------------------------------------------------------------------

/// One wallet-relevant movement within an on-chain transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMovement {
    /// Output index the movement is attributed to
    pub vout: u32,
    /// Direction of funds
    pub direction: Direction,
    /// Amount in satoshis
    pub amount_sats: u64,
    /// Optional counterparty description
    pub label: Option<String>,
}

/// Raw on-chain transaction observation from the node/indexer collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainObservation {
    /// Transaction id
    pub txid: Txid,
    /// Wallet-relevant movements (one entry each)
    pub movements: Vec<OutputMovement>,
    /// Current confirmation depth (0 = mempool)
    pub confirmations: u32,
    /// Block the transaction confirmed in (required once confirmations > 0)
    pub block: Option<BlockRef>,
    /// Block time, if known
    pub block_time: Option<DateTime<Utc>>,
}

/// Lightning payment status as reported by the channel manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightningStatus {
    /// In flight / awaiting settlement
    Pending,
    /// Settled (preimage revealed)
    Settled,
    /// Failed; terminal, a retry uses a new payment hash
    Failed,
}

/// Raw Lightning payment/settlement notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightningEvent {
    /// Payment hash
    pub payment_hash: PaymentHash,
    /// Direction of funds
    pub direction: Direction,
    /// Amount in satoshis
    pub amount_sats: u64,
    /// Reported status
    pub status: LightningStatus,
    /// Settlement proof (required when status is Settled)
    pub preimage: Option<Preimage>,
    /// Settlement time, if settled
    pub settled_at: Option<DateTime<Utc>>,
    /// Optional counterparty description
    pub label: Option<String>,
}

/// Explicit reorg notification from the node collaborator
///
/// Reorgs are never inferred; this event carries the exact set of
/// invalidated blocks and any txids conclusively double-spent on the new
/// best chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorgEvent {
    /// Blocks no longer on the best chain
    pub invalidated_blocks: Vec<BlockRef>,
    /// Transactions conclusively double-spent elsewhere
    pub double_spent: Vec<Txid>,
}

/// Normalized delta produced by the normalizer and consumed by the engine
///
/// Carries a full candidate entry: the engine inserts it if the id is
/// unseen, otherwise merges it into the existing entry under the monotonic
/// transition rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDelta {
    /// Target entry id
    pub id: EntryId,
    /// Direction (immutable once inserted)
    pub direction: Direction,
    /// Amount in satoshis (immutable once inserted)
    pub amount_sats: u64,
    /// Counterparty description, if the source supplied one
    pub counterparty_label: Option<String>,
    /// Chain/settlement timestamp, if known
    pub chain_timestamp: Option<DateTime<Utc>>,
    /// Status implied by the source event
    pub status: EntryStatus,
    /// Rail-specific detail
    pub detail: RailDetail,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txid(n: u8) -> Txid {
        Txid::from_bytes([n; 32])
    }

    #[test]
    fn test_on_chain_id_per_output() {
        let a = EntryId::on_chain(&txid(1), 0);
        let b = EntryId::on_chain(&txid(1), 1);
        let c = EntryId::on_chain(&txid(2), 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
        // Deterministic
        assert_eq!(a, EntryId::on_chain(&txid(1), 0));
    }

    #[test]
    fn test_lightning_id_direction_tagged() {
        let hash = PaymentHash::from_bytes([7; 32]);
        let send = EntryId::lightning(&hash, Direction::Outgoing);
        let recv = EntryId::lightning(&hash, Direction::Incoming);
        assert_ne!(send, recv);
    }

    #[test]
    fn test_status_transition_graph() {
        let pending = EntryStatus::Pending;
        assert!(pending.can_advance_to(&EntryStatus::Confirmed(1)));
        assert!(pending.can_advance_to(&EntryStatus::Settled));
        assert!(pending.can_advance_to(&EntryStatus::Failed));

        let confirmed = EntryStatus::Confirmed(3);
        assert!(confirmed.can_advance_to(&EntryStatus::Confirmed(4)));
        assert!(confirmed.can_advance_to(&EntryStatus::Settled));
        assert!(!confirmed.can_advance_to(&EntryStatus::Confirmed(2)));
        assert!(!confirmed.can_advance_to(&EntryStatus::Confirmed(3)));
        assert!(!confirmed.can_advance_to(&EntryStatus::Pending));
        assert!(!confirmed.can_advance_to(&EntryStatus::Failed));

        assert!(!EntryStatus::Settled.can_advance_to(&EntryStatus::Pending));
        assert!(!EntryStatus::Failed.can_advance_to(&EntryStatus::Settled));
    }

    #[test]
    fn test_status_class() {
        assert_eq!(EntryStatus::Pending.class(), StatusClass::Unsettled);
        assert_eq!(EntryStatus::Confirmed(5).class(), StatusClass::Unsettled);
        assert_eq!(EntryStatus::Settled.class(), StatusClass::Settled);
        assert_eq!(EntryStatus::Failed.class(), StatusClass::Failed);
    }

    #[test]
    fn test_signed_amount() {
        let entry = LedgerEntry {
            id: EntryId::on_chain(&txid(1), 0),
            direction: Direction::Outgoing,
            amount_sats: 500,
            counterparty_label: None,
            created_at: Utc::now(),
            chain_timestamp: None,
            status: EntryStatus::Pending,
            detail: RailDetail::OnChain {
                txid: txid(1),
                vout: 0,
                confirmations: 0,
                block_ref: None,
            },
        };
        assert_eq!(entry.signed_amount_sats(), -500);
    }

    #[test]
    fn test_sort_key_prefers_chain_timestamp() {
        let created = Utc::now();
        let mut entry = LedgerEntry {
            id: EntryId::on_chain(&txid(1), 0),
            direction: Direction::Incoming,
            amount_sats: 1,
            counterparty_label: None,
            created_at: created,
            chain_timestamp: None,
            status: EntryStatus::Pending,
            detail: RailDetail::OnChain {
                txid: txid(1),
                vout: 0,
                confirmations: 0,
                block_ref: None,
            },
        };
        assert_eq!(entry.sort_key().ts_millis, created.timestamp_millis());

        let block_time = created - chrono::Duration::hours(2);
        entry.chain_timestamp = Some(block_time);
        assert_eq!(entry.sort_key().ts_millis, block_time.timestamp_millis());
    }
}
