//! Event dispatcher — anchors lifecycle events to the ledger with
//! retries, and sweeps failed records back into the queue.
//!
//! Callers never block on ledger confirmation: `submit` validates the
//! event, persists a Pending record keyed by the payload's content hash
//! and queues an immediate attempt. The dispatch loop drives the actual
//! submissions against the injected clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use docket_ledger::LedgerClient;
use docket_store::record::{RecordStore, TransactionRecord, TxStatus};
use docket_types::{AnchorPayload, Clock, LifecycleEvent, PayloadHash, Timestamp, TxHash};
use docket_utils::format_duration;

use crate::metrics::NodeMetrics;
use crate::retry_queue::RetryQueue;
use crate::NodeError;

/// Records examined per sweep pass.
const SWEEP_BATCH: usize = 256;

/// Due records fetched from the store per dispatch pass.
const DISPATCH_BATCH: usize = 256;

/// What a caller learns from `submit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Queued for anchoring; the key identifies the record to watch.
    Accepted(PayloadHash),
    /// An identical payload already confirmed; nothing was submitted.
    AlreadyConfirmed(TxHash),
}

pub struct Dispatcher {
    records: Arc<dyn RecordStore + Send + Sync>,
    ledger: Arc<dyn LedgerClient>,
    clock: Arc<dyn Clock>,
    metrics: Arc<NodeMetrics>,
    queue: Mutex<RetryQueue>,
    max_attempts: u32,
    submit_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        records: Arc<dyn RecordStore + Send + Sync>,
        ledger: Arc<dyn LedgerClient>,
        clock: Arc<dyn Clock>,
        metrics: Arc<NodeMetrics>,
        max_attempts: u32,
        base_delay_secs: u64,
        submit_timeout: Duration,
    ) -> Self {
        Self {
            records,
            ledger,
            clock,
            metrics,
            queue: Mutex::new(RetryQueue::with_default(base_delay_secs)),
            max_attempts,
            submit_timeout,
        }
    }

    /// Re-seed the in-memory queue from records that were pending when
    /// the process last stopped.
    pub fn recover(&self) -> Result<usize, NodeError> {
        let now = self.clock.now();
        let pending = self.records.records_by_status(TxStatus::Pending, usize::MAX)?;
        let mut queue = self.queue.lock().expect("retry queue lock poisoned");
        for record in &pending {
            let due = record.next_attempt_at.unwrap_or(now);
            if due <= now {
                queue.enqueue_now(record.content_hash(), now);
            } else {
                // Preserve the persisted schedule rather than restarting it.
                queue.schedule_at(record.content_hash(), due, now);
            }
        }
        if !pending.is_empty() {
            info!(count = pending.len(), "recovered pending submissions");
        }
        Ok(pending.len())
    }

    /// Accept a lifecycle event for anchoring.
    pub fn submit(&self, event: &LifecycleEvent) -> Result<SubmitOutcome, NodeError> {
        let payload = AnchorPayload::build(event)?;
        let hash = payload.content_hash();
        let now = self.clock.now();

        if self.records.record_exists(&hash)? {
            let record = self.records.get_record(&hash)?;
            if let (TxStatus::Confirmed, Some(tx_hash)) = (record.status, record.tx_hash) {
                debug!(payload_hash = %hash, %tx_hash, "payload already confirmed");
                return Ok(SubmitOutcome::AlreadyConfirmed(tx_hash));
            }
            // Existing Pending or Failed record: reuse it under the same
            // key so the event can never confirm twice.
            self.enqueue_now(hash, now);
            return Ok(SubmitOutcome::Accepted(hash));
        }

        let record = TransactionRecord::new(payload, now);
        self.records.put_record(&record)?;
        self.metrics.events_accepted.inc();
        self.enqueue_now(hash, now);
        debug!(payload_hash = %hash, case_id = %record.payload.case_id, "event accepted for anchoring");
        Ok(SubmitOutcome::Accepted(hash))
    }

    fn enqueue_now(&self, hash: PayloadHash, now: Timestamp) {
        self.queue
            .lock()
            .expect("retry queue lock poisoned")
            .enqueue_now(hash, now);
    }

    /// One pass of the dispatch loop: submit everything that has come
    /// due. Returns how many attempts were made.
    ///
    /// The persisted `next_attempt_at` schedule is authoritative: each
    /// pass unions the in-memory queue with `records_due` from the
    /// store, so an entry the bounded queue evicted under load, or one
    /// a pass popped before erroring out, is picked up again while its
    /// record is still Pending.
    pub async fn run_due(&self) -> Result<usize, NodeError> {
        let now = self.clock.now();
        let mut due = self
            .queue
            .lock()
            .expect("retry queue lock poisoned")
            .pop_due(now);
        for record in self.records.records_due(now, DISPATCH_BATCH)? {
            let hash = record.content_hash();
            if !due.contains(&hash) {
                due.push(hash);
            }
        }

        let mut attempted = 0;
        for hash in due {
            let mut record = match self.records.get_record(&hash) {
                Ok(record) => record,
                Err(docket_store::StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            if record.is_settled() {
                continue;
            }
            attempted += 1;
            self.attempt(&mut record, now).await?;
        }
        Ok(attempted)
    }

    /// Make one submission attempt and persist the outcome.
    async fn attempt(&self, record: &mut TransactionRecord, now: Timestamp) -> Result<(), NodeError> {
        let hash = record.content_hash();
        record.attempts += 1;
        self.metrics.submits_attempted.inc();

        let outcome =
            tokio::time::timeout(self.submit_timeout, self.ledger.submit(&record.payload)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(docket_ledger::LedgerError::Timeout),
        };

        match result {
            Ok(receipt) => {
                record.status = TxStatus::Confirmed;
                record.tx_hash = Some(receipt.tx_hash);
                record.next_attempt_at = None;
                record.last_error = None;
                record.updated_at = now;
                self.metrics.submits_confirmed.inc();
                info!(payload_hash = %hash, tx_hash = %receipt.tx_hash, attempts = record.attempts, "anchor confirmed");
            }
            Err(err) => {
                record.last_error = Some(err.to_string());
                record.updated_at = now;
                if record.attempts >= self.max_attempts {
                    record.status = TxStatus::Failed;
                    record.next_attempt_at = None;
                    self.metrics.submits_exhausted.inc();
                    warn!(payload_hash = %hash, attempts = record.attempts, error = %err, "anchor attempts exhausted");
                } else {
                    let failures = record.attempts - 1;
                    let mut queue = self.queue.lock().expect("retry queue lock poisoned");
                    let delay = queue.delay_for(failures);
                    record.next_attempt_at = Some(now.plus_secs(delay));
                    queue.schedule_retry(hash, failures, now);
                    debug!(payload_hash = %hash, attempt = record.attempts, retry_in = %format_duration(delay), error = %err, "anchor attempt failed, retrying");
                }
            }
        }
        self.records.put_record(record)?;
        Ok(())
    }

    /// Sweep recent Failed records back into the queue under their
    /// original idempotency keys. Records older than `max_age_secs` are
    /// left for the operator.
    pub fn sweep_failed(&self, max_age_secs: u64) -> Result<usize, NodeError> {
        let now = self.clock.now();
        let failed = self.records.records_by_status(TxStatus::Failed, SWEEP_BATCH)?;
        let mut resubmitted = 0;
        for mut record in failed {
            if record.updated_at.has_expired(max_age_secs, now) {
                continue;
            }
            record.status = TxStatus::Pending;
            record.attempts = 0;
            record.next_attempt_at = Some(now);
            record.updated_at = now;
            self.records.put_record(&record)?;
            self.enqueue_now(record.content_hash(), now);
            resubmitted += 1;
        }
        if resubmitted > 0 {
            info!(count = resubmitted, "swept failed records back into the queue");
        }
        Ok(resubmitted)
    }

    /// Pending count for the metrics gauge.
    pub fn queued(&self) -> usize {
        self.queue.lock().expect("retry queue lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_nullables::{NullClock, NullLedger, NullStore, ScriptedOutcome};
    use docket_types::{CaseId, EventType};

    struct Harness {
        store: Arc<NullStore>,
        ledger: Arc<NullLedger>,
        clock: Arc<NullClock>,
        dispatcher: Dispatcher,
    }

    fn harness() -> Harness {
        let store = Arc::new(NullStore::new());
        let ledger = Arc::new(NullLedger::new());
        let clock = Arc::new(NullClock::new(1_000));
        let dispatcher = Dispatcher::new(
            store.clone(),
            ledger.clone(),
            clock.clone(),
            Arc::new(NodeMetrics::new()),
            3,
            60,
            Duration::from_secs(120),
        );
        Harness {
            store,
            ledger,
            clock,
            dispatcher,
        }
    }

    fn event(case: &str) -> LifecycleEvent {
        LifecycleEvent::new(
            CaseId::from(case),
            EventType::Created,
            "citizen-1",
            Timestamp::new(1_000),
        )
    }

    #[tokio::test]
    async fn submit_and_confirm() {
        let h = harness();
        let outcome = h.dispatcher.submit(&event("case-1")).unwrap();
        let hash = match outcome {
            SubmitOutcome::Accepted(hash) => hash,
            other => panic!("unexpected outcome: {:?}", other),
        };

        h.dispatcher.run_due().await.unwrap();

        let record = h.store.get_record(&hash).unwrap();
        assert_eq!(record.status, TxStatus::Confirmed);
        assert_eq!(record.attempts, 1);
        assert!(record.tx_hash.is_some());
        assert_eq!(h.ledger.submissions().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_submit_does_not_resubmit() {
        let h = harness();
        h.dispatcher.submit(&event("case-1")).unwrap();
        h.dispatcher.run_due().await.unwrap();

        let outcome = h.dispatcher.submit(&event("case-1")).unwrap();
        assert!(matches!(outcome, SubmitOutcome::AlreadyConfirmed(_)));

        // No new queue entry, no new ledger call.
        assert_eq!(h.dispatcher.queued(), 0);
        h.dispatcher.run_due().await.unwrap();
        assert_eq!(h.ledger.submissions().len(), 1);
        assert_eq!(h.store.record_count(), 1);
    }

    #[tokio::test]
    async fn invalid_event_is_rejected_synchronously() {
        let h = harness();
        let mut ev = event("case-1");
        ev.actor.clear();
        let err = h.dispatcher.submit(&ev).unwrap_err();
        assert!(matches!(err, NodeError::InvalidEvent(_)));
        assert_eq!(h.store.record_count(), 0);
    }

    #[tokio::test]
    async fn transient_failure_backs_off_then_confirms() {
        let h = harness();
        h.ledger.script(ScriptedOutcome::Timeout);
        let SubmitOutcome::Accepted(hash) = h.dispatcher.submit(&event("case-1")).unwrap() else {
            panic!("expected acceptance");
        };

        h.dispatcher.run_due().await.unwrap();
        let record = h.store.get_record(&hash).unwrap();
        assert_eq!(record.status, TxStatus::Pending);
        assert_eq!(record.attempts, 1);
        assert!(record.last_error.is_some());
        // Scheduled 60s out: nothing due before then.
        assert_eq!(record.next_attempt_at, Some(Timestamp::new(1_060)));

        h.clock.advance(59);
        h.dispatcher.run_due().await.unwrap();
        assert_eq!(h.ledger.submissions().len(), 1);

        h.clock.advance(1);
        h.dispatcher.run_due().await.unwrap();
        let record = h.store.get_record(&hash).unwrap();
        assert_eq!(record.status, TxStatus::Confirmed);
        assert_eq!(record.attempts, 2);
    }

    #[tokio::test]
    async fn second_retry_waits_twice_as_long() {
        let h = harness();
        h.ledger.script(ScriptedOutcome::Timeout);
        h.ledger.script(ScriptedOutcome::Transport("reset".into()));
        let SubmitOutcome::Accepted(hash) = h.dispatcher.submit(&event("case-1")).unwrap() else {
            panic!("expected acceptance");
        };

        h.dispatcher.run_due().await.unwrap(); // fails, +60s
        h.clock.advance(60);
        h.dispatcher.run_due().await.unwrap(); // fails, +120s

        let record = h.store.get_record(&hash).unwrap();
        assert_eq!(record.next_attempt_at, Some(Timestamp::new(1_180)));
    }

    #[tokio::test]
    async fn attempts_exhausted_marks_failed() {
        let h = harness();
        for _ in 0..3 {
            h.ledger.script(ScriptedOutcome::Http(503));
        }
        let SubmitOutcome::Accepted(hash) = h.dispatcher.submit(&event("case-1")).unwrap() else {
            panic!("expected acceptance");
        };

        h.dispatcher.run_due().await.unwrap();
        h.clock.advance(60);
        h.dispatcher.run_due().await.unwrap();
        h.clock.advance(120);
        h.dispatcher.run_due().await.unwrap();

        let record = h.store.get_record(&hash).unwrap();
        assert_eq!(record.status, TxStatus::Failed);
        assert_eq!(record.attempts, 3);
        assert!(record.last_error.unwrap().contains("503"));
        assert_eq!(h.dispatcher.queued(), 0);
    }

    #[tokio::test]
    async fn sweep_resubmits_under_the_same_key() {
        let h = harness();
        for _ in 0..3 {
            h.ledger.script(ScriptedOutcome::Timeout);
        }
        let SubmitOutcome::Accepted(hash) = h.dispatcher.submit(&event("case-1")).unwrap() else {
            panic!("expected acceptance");
        };
        h.dispatcher.run_due().await.unwrap();
        h.clock.advance(60);
        h.dispatcher.run_due().await.unwrap();
        h.clock.advance(120);
        h.dispatcher.run_due().await.unwrap();
        assert_eq!(h.store.get_record(&hash).unwrap().status, TxStatus::Failed);

        // Sweep within the age window: back to Pending, same key.
        h.clock.advance(600);
        let swept = h.dispatcher.sweep_failed(86_400).unwrap();
        assert_eq!(swept, 1);
        h.dispatcher.run_due().await.unwrap();

        let record = h.store.get_record(&hash).unwrap();
        assert_eq!(record.status, TxStatus::Confirmed);
        assert_eq!(h.store.record_count(), 1);
    }

    #[tokio::test]
    async fn sweep_ignores_stale_failures() {
        let h = harness();
        h.ledger.script(ScriptedOutcome::Timeout);
        h.ledger.script(ScriptedOutcome::Timeout);
        h.ledger.script(ScriptedOutcome::Timeout);
        h.dispatcher.submit(&event("case-1")).unwrap();
        h.dispatcher.run_due().await.unwrap();
        h.clock.advance(60);
        h.dispatcher.run_due().await.unwrap();
        h.clock.advance(120);
        h.dispatcher.run_due().await.unwrap();

        h.clock.advance(86_400);
        assert_eq!(h.dispatcher.sweep_failed(86_400).unwrap(), 0);
    }

    #[tokio::test]
    async fn recover_reseeds_pending_records() {
        let h = harness();
        h.ledger.script(ScriptedOutcome::Timeout);
        let SubmitOutcome::Accepted(hash) = h.dispatcher.submit(&event("case-1")).unwrap() else {
            panic!("expected acceptance");
        };
        h.dispatcher.run_due().await.unwrap();

        // A fresh dispatcher over the same store: the queue starts empty
        // until recovery re-seeds it.
        let fresh = Dispatcher::new(
            h.store.clone(),
            h.ledger.clone(),
            h.clock.clone(),
            Arc::new(NodeMetrics::new()),
            3,
            60,
            Duration::from_secs(120),
        );
        assert_eq!(fresh.queued(), 0);
        assert_eq!(fresh.recover().unwrap(), 1);

        h.clock.advance(60);
        fresh.run_due().await.unwrap();
        assert_eq!(h.store.get_record(&hash).unwrap().status, TxStatus::Confirmed);
    }

    #[tokio::test]
    async fn store_schedule_is_authoritative_when_the_queue_lost_an_entry() {
        let h = harness();
        // A due Pending record the in-memory queue has never seen, as
        // after an eviction under load or a pass cut short by an error.
        let payload = AnchorPayload::build(&event("case-1")).unwrap();
        let hash = payload.content_hash();
        h.store
            .put_record(&TransactionRecord::new(payload, Timestamp::new(1_000)))
            .unwrap();
        assert_eq!(h.dispatcher.queued(), 0);

        let attempted = h.dispatcher.run_due().await.unwrap();
        assert_eq!(attempted, 1);
        assert_eq!(h.store.get_record(&hash).unwrap().status, TxStatus::Confirmed);
    }

    #[tokio::test]
    async fn flood_past_queue_capacity_confirms_every_record() {
        let h = harness();
        // One more than the queue holds, so at least one enqueue gets
        // evicted before the first dispatch pass runs.
        let total = 4097usize;
        for i in 0..total {
            h.dispatcher.submit(&event(&format!("case-{i}"))).unwrap();
        }

        while h.dispatcher.run_due().await.unwrap() > 0 {}

        let pending = h
            .store
            .records_by_status(TxStatus::Pending, usize::MAX)
            .unwrap();
        assert!(pending.is_empty());
        let confirmed = h
            .store
            .records_by_status(TxStatus::Confirmed, usize::MAX)
            .unwrap();
        assert_eq!(confirmed.len(), total);
    }
}
