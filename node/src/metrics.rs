//! Prometheus metrics for the docket node.
//!
//! Counters and gauges covering anchoring throughput, retries, SLA
//! escalations and reconciliation. The [`NodeMetrics`] struct owns a
//! dedicated [`Registry`] that can be encoded into the Prometheus text
//! exposition format by whatever serves it.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Total lifecycle events accepted by the dispatcher.
    pub events_accepted: IntCounter,
    /// Total ledger submissions attempted (including retries).
    pub submits_attempted: IntCounter,
    /// Total submissions confirmed by the ledger.
    pub submits_confirmed: IntCounter,
    /// Total records that exhausted their attempts.
    pub submits_exhausted: IntCounter,
    /// Total SLA escalations recorded on the ledger.
    pub escalations_recorded: IntCounter,
    /// Total ledger events merged by the reconciler.
    pub events_reconciled: IntCounter,
    /// Total reconciliation conflicts flagged.
    pub reconcile_conflicts: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Records currently pending (re)submission.
    pub pending_records: IntGauge,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let events_accepted = register_int_counter_with_registry!(
            Opts::new(
                "docket_events_accepted_total",
                "Total lifecycle events accepted by the dispatcher"
            ),
            registry
        )
        .expect("failed to register events_accepted counter");

        let submits_attempted = register_int_counter_with_registry!(
            Opts::new(
                "docket_submits_attempted_total",
                "Total ledger submissions attempted, including retries"
            ),
            registry
        )
        .expect("failed to register submits_attempted counter");

        let submits_confirmed = register_int_counter_with_registry!(
            Opts::new(
                "docket_submits_confirmed_total",
                "Total submissions confirmed by the ledger"
            ),
            registry
        )
        .expect("failed to register submits_confirmed counter");

        let submits_exhausted = register_int_counter_with_registry!(
            Opts::new(
                "docket_submits_exhausted_total",
                "Total records that exhausted their submission attempts"
            ),
            registry
        )
        .expect("failed to register submits_exhausted counter");

        let escalations_recorded = register_int_counter_with_registry!(
            Opts::new(
                "docket_escalations_recorded_total",
                "Total SLA escalations recorded on the ledger"
            ),
            registry
        )
        .expect("failed to register escalations_recorded counter");

        let events_reconciled = register_int_counter_with_registry!(
            Opts::new(
                "docket_events_reconciled_total",
                "Total ledger events merged by the reconciler"
            ),
            registry
        )
        .expect("failed to register events_reconciled counter");

        let reconcile_conflicts = register_int_counter_with_registry!(
            Opts::new(
                "docket_reconcile_conflicts_total",
                "Total reconciliation conflicts flagged for review"
            ),
            registry
        )
        .expect("failed to register reconcile_conflicts counter");

        let pending_records = register_int_gauge_with_registry!(
            Opts::new(
                "docket_pending_records",
                "Records currently pending (re)submission"
            ),
            registry
        )
        .expect("failed to register pending_records gauge");


        Self {
            registry,
            events_accepted,
            submits_attempted,
            submits_confirmed,
            submits_exhausted,
            escalations_recorded,
            events_reconciled,
            reconcile_conflicts,
            pending_records,
        }
    }

    /// Encode every registered metric into the Prometheus text format.
    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&self.registry.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
