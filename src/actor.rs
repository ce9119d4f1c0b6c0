//! Apply-loop concurrency for the ledger
//!
//! A single Tokio task owns the mutation path: every writer (on-chain
//! observations, Lightning events, reorg notifications, resets) serializes
//! through one bounded mailbox. That gives per-entry mutual exclusion for
//! free and makes notification order identical to mutation order.
//!
//! Readers never enter the mailbox; they go straight to the shared store.
//!
//! ```text
//! node/indexer ─┐
//! channel mgr ──┼─▶ LedgerHandle ─▶ mpsc mailbox ─▶ apply task
//! reorg feed  ──┘                                      │
//!                               normalizer ─▶ engine ─▶ store
//! ```

use crate::engine::{ApplyOutcome, ReconciliationEngine, ReorgOutcome};
use crate::normalizer::EventNormalizer;
use crate::types::{LightningEvent, OnChainObservation, ReorgEvent};
use crate::{Error, Result};
use tokio::sync::{mpsc, oneshot};

/// Message sent to the apply task
#[derive(Debug)]
pub enum LedgerMessage {
    /// Ingest an on-chain observation (one outcome per movement)
    OnChain {
        /// Raw observation
        observation: OnChainObservation,
        /// Reply channel
        response: oneshot::Sender<Result<Vec<ApplyOutcome>>>,
    },

    /// Ingest a Lightning payment/settlement notification
    Lightning {
        /// Raw event
        event: LightningEvent,
        /// Reply channel
        response: oneshot::Sender<Result<ApplyOutcome>>,
    },

    /// Process a reorg notification
    Reorg {
        /// Raw event
        event: ReorgEvent,
        /// Reply channel
        response: oneshot::Sender<Result<ReorgOutcome>>,
    },

    /// Wallet reset
    Reset {
        /// Reply channel
        response: oneshot::Sender<()>,
    },

    /// Shutdown the apply task
    Shutdown,
}

/// The apply task: drains the mailbox, normalizes, and applies
#[derive(Debug)]
pub struct LedgerActor {
    normalizer: EventNormalizer,
    engine: ReconciliationEngine,
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create the actor
    pub fn new(
        normalizer: EventNormalizer,
        engine: ReconciliationEngine,
        mailbox: mpsc::Receiver<LedgerMessage>,
    ) -> Self {
        Self {
            normalizer,
            engine,
            mailbox,
        }
    }

    /// Run the apply loop until shutdown or mailbox close
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => break,
                other => self.handle_message(other),
            }
        }
        tracing::info!("Ledger apply loop stopped");
    }

    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::OnChain {
                observation,
                response,
            } => {
                let result = self.apply_on_chain(observation);
                let _ = response.send(result);
            }

            LedgerMessage::Lightning { event, response } => {
                let result = self
                    .normalizer
                    .normalize_lightning(&event)
                    .and_then(|delta| self.engine.apply(delta));
                let _ = response.send(result);
            }

            LedgerMessage::Reorg { event, response } => {
                let _ = response.send(self.engine.apply_reorg(event));
            }

            LedgerMessage::Reset { response } => {
                self.engine.reset();
                let _ = response.send(());
            }

            LedgerMessage::Shutdown => {
                // Handled in the main loop
            }
        }
    }

    /// Normalize first (all-or-nothing), then apply per movement.
    ///
    /// Movements are applied in observation order; each is an independent
    /// entry, so a rejection aborts the remainder of this observation but
    /// leaves already-applied movements committed.
    fn apply_on_chain(&mut self, observation: OnChainObservation) -> Result<Vec<ApplyOutcome>> {
        let deltas = self.normalizer.normalize_on_chain(&observation)?;

        let mut outcomes = Vec::with_capacity(deltas.len());
        for delta in deltas {
            outcomes.push(self.engine.apply(delta)?);
        }
        Ok(outcomes)
    }
}

/// Handle for sending messages to the apply task
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create a handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Ingest an on-chain observation
    pub async fn ingest_on_chain(
        &self,
        observation: OnChainObservation,
    ) -> Result<Vec<ApplyOutcome>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::OnChain {
                observation,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Apply loop mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Ingest a Lightning event
    pub async fn ingest_lightning(&self, event: LightningEvent) -> Result<ApplyOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Lightning {
                event,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Apply loop mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Ingest a reorg notification
    pub async fn ingest_reorg(&self, event: ReorgEvent) -> Result<ReorgOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Reorg {
                event,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Apply loop mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Wallet reset
    pub async fn reset(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Reset { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Apply loop mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Shutdown the apply task
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Apply loop mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the apply task and return its handle
pub fn spawn_apply_loop(
    normalizer: EventNormalizer,
    engine: ReconciliationEngine,
    mailbox_capacity: usize,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded for backpressure
    let actor = LedgerActor::new(normalizer, engine, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
