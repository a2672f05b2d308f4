//! SLA deadline tracking and escalation.
//!
//! Deadlines live in the SLA store; a periodic scan escalates breached,
//! not-yet-escalated cases oldest-first. Before calling `escalate` the
//! tracker asks the ledger whether an escalation entry already exists, so
//! a crash between the ledger call and the local flag can never produce
//! a second escalation entry.

use std::sync::Arc;

use tracing::{debug, info, warn};

use docket_ledger::LedgerClient;
use docket_store::sla::{SlaRecord, SlaStore};
use docket_types::{CaseId, Clock};

use crate::metrics::NodeMetrics;
use crate::notify::EscalationNotifier;
use crate::NodeError;

pub struct SlaTracker {
    slas: Arc<dyn SlaStore + Send + Sync>,
    ledger: Arc<dyn LedgerClient>,
    notifier: Arc<dyn EscalationNotifier>,
    clock: Arc<dyn Clock>,
    metrics: Arc<NodeMetrics>,
    batch_size: usize,
}

impl SlaTracker {
    pub fn new(
        slas: Arc<dyn SlaStore + Send + Sync>,
        ledger: Arc<dyn LedgerClient>,
        notifier: Arc<dyn EscalationNotifier>,
        clock: Arc<dyn Clock>,
        metrics: Arc<NodeMetrics>,
        batch_size: usize,
    ) -> Self {
        Self {
            slas,
            ledger,
            notifier,
            clock,
            metrics,
            batch_size,
        }
    }

    /// Set or move a case's resolution deadline to `now + window_secs`.
    ///
    /// An escalation that already happened stays escalated; only the
    /// deadline moves.
    pub fn set_deadline(&self, case_id: &CaseId, window_secs: u64) -> Result<(), NodeError> {
        let now = self.clock.now();
        let deadline = now.plus_secs(window_secs);
        let record = match self.slas.get_sla(case_id) {
            Ok(mut existing) => {
                existing.deadline = deadline;
                existing
            }
            Err(docket_store::StoreError::NotFound(_)) => {
                SlaRecord::new(case_id.clone(), deadline, now)
            }
            Err(e) => return Err(e.into()),
        };
        self.slas.put_sla(&record)?;
        debug!(%case_id, %deadline, "SLA deadline set");
        Ok(())
    }

    /// Take a case out of the scan when it resolves. The record stays
    /// on disk for audit.
    pub fn resolve(&self, case_id: &CaseId) -> Result<(), NodeError> {
        match self.slas.get_sla(case_id) {
            Ok(mut record) => {
                record.resolved_at = Some(self.clock.now());
                self.slas.put_sla(&record)?;
                debug!(%case_id, "SLA window closed on resolution");
                Ok(())
            }
            // Resolving a case that never had a deadline is fine.
            Err(docket_store::StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// One scan pass: escalate up to `batch_size` breached cases, oldest
    /// deadline first. Returns how many escalations were recorded.
    pub async fn scan(&self) -> Result<usize, NodeError> {
        let now = self.clock.now();
        let due = self.slas.slas_due(now, self.batch_size)?;
        let mut escalated = 0;

        for mut record in due {
            let case_id = record.case_id.clone();

            // The ledger is authoritative: if it already shows the
            // escalation, only the local flag is behind.
            match self.ledger.is_escalated(&case_id).await {
                Ok(true) => {
                    record.escalated = true;
                    record.escalated_at = Some(now);
                    self.slas.put_sla(&record)?;
                    debug!(%case_id, "escalation already on ledger, flagged locally");
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(%case_id, error = %e, "could not check escalation state, will retry next scan");
                    continue;
                }
            }

            match self.ledger.escalate(&case_id).await {
                Ok(receipt) => {
                    record.escalated = true;
                    record.escalated_at = Some(now);
                    self.slas.put_sla(&record)?;
                    self.metrics.escalations_recorded.inc();
                    self.notifier.notify_escalation(&case_id);
                    escalated += 1;
                    info!(%case_id, tx_hash = %receipt.tx_hash, "case escalated");
                }
                Err(e) => {
                    // Left unescalated: the next scan picks it up again.
                    warn!(%case_id, error = %e, "escalation failed, will retry next scan");
                }
            }
        }
        Ok(escalated)
    }
}
