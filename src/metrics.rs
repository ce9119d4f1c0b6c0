//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_deltas_applied_total` - Deltas committed to the store
//! - `ledger_deltas_rejected_total` - Rejected deltas, labeled by reason
//! - `ledger_reorgs_total` - Reorg notifications processed
//! - `ledger_entries` - Current entry count
//! - `ledger_confirmed_balance_sats` - Current confirmed balance

use crate::Error;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Deltas committed
    pub deltas_applied: IntCounter,

    /// Deltas rejected, by reason
    pub deltas_rejected: IntCounterVec,

    /// Reorgs processed
    pub reorgs: IntCounter,

    /// Current entry count
    pub entries: IntGauge,

    /// Current confirmed balance in satoshis
    pub confirmed_balance: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create a metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let deltas_applied = IntCounter::with_opts(Opts::new(
            "ledger_deltas_applied_total",
            "Deltas committed to the store",
        ))?;
        registry.register(Box::new(deltas_applied.clone()))?;

        let deltas_rejected = IntCounterVec::new(
            Opts::new("ledger_deltas_rejected_total", "Rejected deltas by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(deltas_rejected.clone()))?;

        let reorgs = IntCounter::with_opts(Opts::new(
            "ledger_reorgs_total",
            "Reorg notifications processed",
        ))?;
        registry.register(Box::new(reorgs.clone()))?;

        let entries = IntGauge::with_opts(Opts::new("ledger_entries", "Current entry count"))?;
        registry.register(Box::new(entries.clone()))?;

        let confirmed_balance = IntGauge::with_opts(Opts::new(
            "ledger_confirmed_balance_sats",
            "Current confirmed balance in satoshis",
        ))?;
        registry.register(Box::new(confirmed_balance.clone()))?;

        Ok(Self {
            deltas_applied,
            deltas_rejected,
            reorgs,
            entries,
            confirmed_balance,
            registry,
        })
    }

    /// Record a committed delta
    pub fn record_delta_applied(&self) {
        self.deltas_applied.inc();
    }

    /// Record a rejected delta
    pub fn record_delta_rejected(&self, error: &Error) {
        let reason = match error {
            Error::MalformedEvent(_) => "malformed_event",
            Error::ConsistencyViolation(_) => "consistency_violation",
            Error::InvalidTransition(_) => "invalid_transition",
            Error::UnknownReorgTarget(_) => "unknown_reorg_target",
            _ => "other",
        };
        self.deltas_rejected.with_label_values(&[reason]).inc();
    }

    /// Record a processed reorg
    pub fn record_reorg(&self) {
        self.reorgs.inc();
    }

    /// Update store-derived gauges
    pub fn observe_store(&self, entry_count: usize, confirmed_balance_sats: i64) {
        self.entries.set(entry_count as i64);
        self.confirmed_balance.set(confirmed_balance_sats);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("deltas_applied", &self.deltas_applied.get())
            .field("reorgs", &self.reorgs.get())
            .field("entries", &self.entries.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.deltas_applied.get(), 0);
        assert_eq!(metrics.reorgs.get(), 0);
    }

    #[test]
    fn test_record_applied_and_rejected() {
        let metrics = Metrics::new().unwrap();
        metrics.record_delta_applied();
        metrics.record_delta_applied();
        assert_eq!(metrics.deltas_applied.get(), 2);

        metrics.record_delta_rejected(&Error::InvalidTransition("x".to_string()));
        assert_eq!(
            metrics
                .deltas_rejected
                .with_label_values(&["invalid_transition"])
                .get(),
            1
        );
    }

    #[test]
    fn test_observe_store() {
        let metrics = Metrics::new().unwrap();
        metrics.observe_store(42, 1_440_123);
        assert_eq!(metrics.entries.get(), 42);
        assert_eq!(metrics.confirmed_balance.get(), 1_440_123);
    }
}
