//! Main ledger orchestration layer
//!
//! Ties the normalizer, apply loop, store, projector, and view together
//! into the high-level API the excluded collaborators use: node/indexer
//! and channel manager feed events in, the presentation layer reads feeds,
//! balances, and change notifications out.
//!
//! # Example
//!
//! ```no_run
//! use rail_ledger::{Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> rail_ledger::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(config).await?;
//!
//!     // let outcomes = ledger.ingest_on_chain(observation).await?;
//!     let balances = ledger.get_balance();
//!     println!("confirmed: {} sats", balances.confirmed_sats);
//!
//!     Ok(())
//! }
//! ```

use crate::actor::{spawn_apply_loop, LedgerHandle};
use crate::balance::{BalanceProjector, Balances};
use crate::engine::{ApplyOutcome, ReconciliationEngine, ReorgOutcome};
use crate::metrics::Metrics;
use crate::normalizer::EventNormalizer;
use crate::store::{LedgerStore, StoreStats};
use crate::types::{EntryId, LedgerEntry, LightningEvent, OnChainObservation, ReorgEvent};
use crate::view::{EntryFilter, LedgerChange, LedgerView, Page, Pagination};
use crate::{Config, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Main ledger interface
#[derive(Debug)]
pub struct Ledger {
    /// Handle into the apply loop (all mutations)
    handle: LedgerHandle,

    /// Direct store access (for reads)
    store: Arc<LedgerStore>,

    /// Incrementally maintained balances
    projector: Arc<BalanceProjector>,

    /// Read API
    view: LedgerView,

    /// Metrics collector
    metrics: Metrics,
}

impl Ledger {
    /// Open a ledger with the given configuration
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(LedgerStore::new());
        let projector = Arc::new(BalanceProjector::new());
        let metrics = Metrics::new()?;
        let (notifier, _) = broadcast::channel(config.channels.notify_capacity);

        let engine = ReconciliationEngine::new(
            store.clone(),
            projector.clone(),
            notifier.clone(),
            metrics.clone(),
            config.confirmation_threshold,
        );

        let handle = spawn_apply_loop(
            EventNormalizer::new(),
            engine,
            config.channels.mailbox_capacity,
        );

        let view = LedgerView::new(store.clone(), notifier, config.view.max_page_size);

        tracing::info!(
            confirmation_threshold = config.confirmation_threshold,
            "Ledger opened"
        );

        Ok(Self {
            handle,
            store,
            projector,
            view,
            metrics,
        })
    }

    // Inbound: collaborator events

    /// Ingest an on-chain transaction observation
    ///
    /// Returns one outcome per wallet-relevant movement, in observation
    /// order.
    pub async fn ingest_on_chain(
        &self,
        observation: OnChainObservation,
    ) -> Result<Vec<ApplyOutcome>> {
        self.handle.ingest_on_chain(observation).await
    }

    /// Ingest a Lightning payment/settlement notification
    pub async fn ingest_lightning(&self, event: LightningEvent) -> Result<ApplyOutcome> {
        self.handle.ingest_lightning(event).await
    }

    /// Process an explicit reorg notification
    pub async fn ingest_reorg(&self, event: ReorgEvent) -> Result<ReorgOutcome> {
        self.handle.ingest_reorg(event).await
    }

    // Outbound: presentation layer

    /// Ordered, filtered, paginated transaction feed (newest first)
    pub fn list(&self, filter: EntryFilter, pagination: Pagination) -> Page {
        self.view.list(filter, pagination)
    }

    /// Single entry lookup
    pub fn get_entry(&self, id: &EntryId) -> Result<LedgerEntry> {
        self.view
            .get(id)
            .ok_or_else(|| crate::Error::EntryNotFound(id.to_string()))
    }

    /// Current balances from the incremental projection
    pub fn get_balance(&self) -> Balances {
        self.projector.snapshot()
    }

    /// Stream of change notifications, in mutation order
    pub fn subscribe(&self) -> BroadcastStream<LedgerChange> {
        self.view.subscribe()
    }

    /// Entry counts by rail and status class
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Verify the incremental balance projection against a full
    /// recomputation from the store alone
    ///
    /// Drift here is a bug; callers surface a `false` to the operator.
    pub fn audit_balances(&self) -> bool {
        self.projector.snapshot() == BalanceProjector::recompute(&self.store)
    }

    /// Metrics collector (for scraping/export by the embedding process)
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Wallet reset: drop every entry and zero balances
    pub async fn reset(&self) -> Result<()> {
        self.handle.reset().await
    }

    /// Shutdown the apply loop
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}
