//! Unified dual-rail wallet ledger
//!
//! Reconciles two structurally different payment rails — on-chain Bitcoin
//! transactions and Lightning Network payments — into one consistent,
//! chronologically ordered, incrementally updatable history, and derives
//! materialized balances from it.
//!
//! # Architecture
//!
//! - **Event normalization**: raw collaborator events become a common delta shape
//! - **Single writer**: one apply task serializes all mutations
//! - **Monotonic lifecycle**: Pending → Confirmed(n) → Settled, or Pending → Failed,
//!   reversed only by explicit reorg notifications
//! - **Derived balances**: incremental projection, always recomputable from the store
//!
//! # Invariants
//!
//! - Entry ids are the dedup key: re-ingesting an event is a no-op or a pure
//!   status upgrade, never a duplicate entry
//! - Arrival order does not matter for events touching disjoint entries
//! - Readers never observe an entry mid-update
//! - Entries are never deleted except by explicit wallet reset

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod balance;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod normalizer;
pub mod store;
pub mod types;
pub mod view;

// Re-exports
pub use balance::{BalanceProjector, Balances};
pub use config::Config;
pub use engine::{ApplyOutcome, ReconciliationEngine, ReorgOutcome};
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use normalizer::EventNormalizer;
pub use store::{LedgerStore, StoreStats};
pub use types::{
    BlockRef, Direction, EntryDelta, EntryId, EntryStatus, LedgerEntry, LightningEvent,
    LightningStatus, OnChainObservation, OutputMovement, PaymentHash, Preimage, Rail, RailDetail,
    ReorgEvent, StatusClass, Txid,
};
pub use view::{Cursor, EntryFilter, LedgerChange, LedgerView, Page, Pagination};
