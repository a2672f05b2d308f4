//! Reconciliation of the local mirror against the ledger.
//!
//! The ledger is the source of truth; the mirror is a cache. Each sync
//! pulls events strictly after the stored cursor, merges them into the
//! record table and commits the whole batch plus the cursor advance in
//! one durable step, so replaying a batch after a crash is a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use docket_ledger::{LedgerClient, LedgerEvent};
use docket_store::record::{RecordStore, TransactionRecord, TxStatus};
use docket_store::sync::SyncBatch;
use docket_store::MetaStore;
use docket_types::Clock;

use crate::metrics::NodeMetrics;
use crate::NodeError;

/// Events requested per page.
const PAGE_SIZE: usize = 128;

pub struct Reconciler {
    records: Arc<dyn RecordStore + Send + Sync>,
    meta: Arc<dyn MetaStore + Send + Sync>,
    batch: Arc<dyn SyncBatch + Send + Sync>,
    ledger: Arc<dyn LedgerClient>,
    clock: Arc<dyn Clock>,
    metrics: Arc<NodeMetrics>,
    /// Serializes sync runs; an overlapping timer tick is skipped.
    running: Mutex<()>,
}

/// What one sync pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub merged: usize,
    pub conflicts: usize,
    pub skipped: bool,
}

impl Reconciler {
    pub fn new(
        records: Arc<dyn RecordStore + Send + Sync>,
        meta: Arc<dyn MetaStore + Send + Sync>,
        batch: Arc<dyn SyncBatch + Send + Sync>,
        ledger: Arc<dyn LedgerClient>,
        clock: Arc<dyn Clock>,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        Self {
            records,
            meta,
            batch,
            ledger,
            clock,
            metrics,
            running: Mutex::new(()),
        }
    }

    /// Pull and merge everything past the cursor. A run already in
    /// progress makes this call a no-op.
    pub async fn sync(&self) -> Result<SyncReport, NodeError> {
        let Ok(_guard) = self.running.try_lock() else {
            debug!("reconcile already running, skipping this tick");
            return Ok(SyncReport {
                skipped: true,
                ..SyncReport::default()
            });
        };

        let mut report = SyncReport::default();
        let mut cursor = self.meta.get_sync_cursor()?;

        loop {
            let mut events = self.ledger.events_since(cursor, PAGE_SIZE).await?;
            if events.is_empty() {
                break;
            }
            // Cursor covers the highest sequence in the page.
            let page_cursor = events
                .iter()
                .map(|ev| ev.sequence)
                .max()
                .unwrap_or(cursor);
            // Arrival order is not trusted: merge in event-time order.
            events.sort_by_key(|ev| (ev.payload.occurred_at, ev.sequence));

            // Later events in the page must see what earlier ones
            // merged, so two anchors for the same payload arriving in
            // one page take the conflict path instead of the second
            // overwriting the first.
            let mut upserts: HashMap<[u8; 32], TransactionRecord> = HashMap::new();
            for event in &events {
                let current = match upserts.get(event.payload_hash.as_bytes()) {
                    Some(record) => Some(record.clone()),
                    None => match self.records.get_record(&event.payload_hash) {
                        Ok(record) => Some(record),
                        Err(docket_store::StoreError::NotFound(_)) => None,
                        Err(e) => return Err(e.into()),
                    },
                };
                if let Some(record) = self.merge(event, current, &mut report) {
                    upserts.insert(*record.content_hash().as_bytes(), record);
                }
            }
            let merged: Vec<TransactionRecord> = upserts.into_values().collect();
            self.batch.apply_sync_batch(&merged, page_cursor)?;
            cursor = page_cursor;
        }

        if report.merged > 0 || report.conflicts > 0 {
            info!(
                merged = report.merged,
                conflicts = report.conflicts,
                cursor,
                "reconcile pass complete"
            );
        }
        Ok(report)
    }

    /// Merge one ledger event against the record as the page has seen
    /// it so far; returns the record to upsert, if any.
    fn merge(
        &self,
        event: &LedgerEvent,
        current: Option<TransactionRecord>,
        report: &mut SyncReport,
    ) -> Option<TransactionRecord> {
        let now = self.clock.now();
        let Some(mut record) = current else {
            // Anchored but never mirrored (crash mid-submit, or an
            // out-of-band writer). Rebuild from the ledger.
            let mut record = TransactionRecord::new(event.payload.clone(), now);
            record.status = TxStatus::Confirmed;
            record.tx_hash = Some(event.tx_hash);
            record.next_attempt_at = None;
            report.merged += 1;
            self.metrics.events_reconciled.inc();
            debug!(payload_hash = %event.payload_hash, "rebuilt missing record from ledger");
            return Some(record);
        };

        match (record.status, record.tx_hash) {
            (TxStatus::Confirmed, Some(tx_hash)) if tx_hash == event.tx_hash => {
                // Duplicate delivery.
                None
            }
            (TxStatus::Confirmed, Some(tx_hash)) => {
                // Same payload, two different anchors: flag it and move
                // on; a conflict never blocks the cursor.
                report.conflicts += 1;
                self.metrics.reconcile_conflicts.inc();
                warn!(
                    payload_hash = %event.payload_hash,
                    local_tx = %tx_hash,
                    ledger_tx = %event.tx_hash,
                    "reconciliation conflict, record flagged for review"
                );
                record.last_error = Some(format!(
                    "reconciliation conflict: local tx {} vs ledger tx {}",
                    tx_hash, event.tx_hash
                ));
                record.updated_at = now;
                Some(record)
            }
            _ => {
                // Pending or Failed locally, settled on the ledger.
                record.status = TxStatus::Confirmed;
                record.tx_hash = Some(event.tx_hash);
                record.next_attempt_at = None;
                record.last_error = None;
                record.updated_at = now;
                report.merged += 1;
                self.metrics.events_reconciled.inc();
                Some(record)
            }
        }
    }
}
