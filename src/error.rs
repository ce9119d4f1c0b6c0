//! Error types for the ledger
//!
//! No error here is fatal: every rejection leaves the store untouched for
//! the rejected event and the engine available for subsequent events.

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Raw collaborator event missing required fields; nothing was applied
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Immutable fields of a known entry conflict with an incoming delta.
    /// Signals a normalizer or source bug; the delta is rejected.
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    /// Status would move backward outside the sanctioned reorg path;
    /// the delta is dropped and logged.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Reorg references blocks or transactions not present in the store
    #[error("Unknown reorg target: {0}")]
    UnknownReorgTarget(String),

    /// Entry not found
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
