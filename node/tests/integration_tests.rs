//! Integration tests exercising the full anchoring pipeline:
//! case mutation → diffing → dispatch → LMDB persistence → SLA scan →
//! reconciliation readback.
//!
//! These tests wire together components that are normally only connected
//! inside `service.rs`, verifying the system works end-to-end — not just
//! in isolation.

use std::sync::{Arc, Mutex};

use docket_ledger::LedgerEvent;
use docket_node::{
    CaseSnapshot, CaseStatus, DocketNode, EscalationNotifier, NodeConfig, SubmitOutcome,
};
use docket_nullables::{NullClock, NullLedger, ScriptedOutcome};
use docket_store::TxStatus;
use docket_types::{AnchorPayload, CaseId, Clock, EventType, LifecycleEvent, Timestamp, TxHash};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct RecordingNotifier {
    calls: Mutex<Vec<CaseId>>,
}

impl RecordingNotifier {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl EscalationNotifier for RecordingNotifier {
    fn notify_escalation(&self, case_id: &CaseId) {
        self.calls.lock().unwrap().push(case_id.clone());
    }
}

struct Harness {
    _data_dir: tempfile::TempDir,
    _evidence_dir: tempfile::TempDir,
    node: DocketNode,
    ledger: Arc<NullLedger>,
    clock: Arc<NullClock>,
    notifier: Arc<RecordingNotifier>,
}

fn harness() -> Harness {
    let data_dir = tempfile::tempdir().expect("temp data dir");
    let evidence_dir = tempfile::tempdir().expect("temp evidence dir");
    let config = NodeConfig {
        data_dir: data_dir.path().to_path_buf(),
        evidence_dir: evidence_dir.path().to_path_buf(),
        ..NodeConfig::default()
    };
    let ledger = Arc::new(NullLedger::new());
    let clock = Arc::new(NullClock::new(1_000_000));
    let notifier = Arc::new(RecordingNotifier::new());
    let node = DocketNode::with_clock(config, ledger.clone(), notifier.clone(), clock.clone())
        .expect("open node");
    Harness {
        _data_dir: data_dir,
        _evidence_dir: evidence_dir,
        node,
        ledger,
        clock,
        notifier,
    }
}

fn open_case(id: &str) -> CaseSnapshot {
    CaseSnapshot {
        case_id: CaseId::from(id),
        status: CaseStatus::Open,
        assignee: None,
        category: Some("sanitation".to_owned()),
    }
}

fn assigned_case(id: &str) -> CaseSnapshot {
    CaseSnapshot {
        assignee: Some("field-team-1".to_owned()),
        status: CaseStatus::InProgress,
        ..open_case(id)
    }
}

fn accepted_hash(outcome: &SubmitOutcome) -> docket_types::PayloadHash {
    match outcome {
        SubmitOutcome::Accepted(hash) => *hash,
        SubmitOutcome::AlreadyConfirmed(_) => panic!("expected acceptance"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn created_event_is_anchored_end_to_end() {
    let h = harness();
    let outcomes = h
        .node
        .handle_case_change(None, &open_case("case-1"), "citizen-9", h.clock.now())
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    let hash = accepted_hash(&outcomes[0]);

    h.node.dispatcher().run_due().await.unwrap();

    let submissions = h.ledger.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].event_type, EventType::Created);
    assert_eq!(submissions[0].case_id, CaseId::from("case-1"));

    // The null ledger's default receipt derives the tx hash from the payload.
    let record = h.node.records().get_record(&hash).unwrap();
    assert_eq!(record.status, TxStatus::Confirmed);
    assert_eq!(record.tx_hash, Some(TxHash::new(*hash.as_bytes())));
}

#[tokio::test]
async fn assignment_sets_the_sla_window_and_breach_escalates_once() {
    let h = harness();
    let old = open_case("case-1");
    h.node
        .handle_case_change(None, &old, "citizen-9", h.clock.now())
        .unwrap();
    h.node
        .handle_case_change(Some(&old), &assigned_case("case-1"), "system", h.clock.now())
        .unwrap();
    h.node.dispatcher().run_due().await.unwrap();

    // 47h later: still inside the 48h window, scan does nothing.
    h.clock.advance(47 * 3600);
    assert_eq!(h.node.sla_tracker().scan().await.unwrap(), 0);
    assert!(h.ledger.escalations().is_empty());

    // 49h after assignment: breached, escalated exactly once.
    h.clock.advance(2 * 3600);
    assert_eq!(h.node.sla_tracker().scan().await.unwrap(), 1);
    assert_eq!(h.ledger.escalations(), vec![CaseId::from("case-1")]);
    assert_eq!(h.notifier.count(), 1);

    // Second scan is a no-op.
    assert_eq!(h.node.sla_tracker().scan().await.unwrap(), 0);
    assert_eq!(h.notifier.count(), 1);
}

#[tokio::test]
async fn resolution_cancels_the_sla_window() {
    let h = harness();
    let old = open_case("case-1");
    let assigned = assigned_case("case-1");
    h.node
        .handle_case_change(None, &old, "citizen-9", h.clock.now())
        .unwrap();
    h.node
        .handle_case_change(Some(&old), &assigned, "system", h.clock.now())
        .unwrap();

    let resolved = CaseSnapshot {
        status: CaseStatus::Resolved,
        ..assigned.clone()
    };
    h.node
        .handle_case_change(Some(&assigned), &resolved, "system", h.clock.now())
        .unwrap();

    h.clock.advance(100 * 3600);
    assert_eq!(h.node.sla_tracker().scan().await.unwrap(), 0);
    assert!(h.ledger.escalations().is_empty());
}

#[tokio::test]
async fn exhausted_retries_then_sweep_produces_exactly_one_confirmation() {
    let h = harness();
    for _ in 0..3 {
        h.ledger
            .script(ScriptedOutcome::Transport("gateway down".into()));
    }
    let outcomes = h
        .node
        .handle_case_change(None, &open_case("case-1"), "citizen-9", h.clock.now())
        .unwrap();
    let hash = accepted_hash(&outcomes[0]);

    // Three attempts: immediate, +60s, +120s.
    h.node.dispatcher().run_due().await.unwrap();
    h.clock.advance(60);
    h.node.dispatcher().run_due().await.unwrap();
    h.clock.advance(120);
    h.node.dispatcher().run_due().await.unwrap();

    let record = h.node.records().get_record(&hash).unwrap();
    assert_eq!(record.status, TxStatus::Failed);
    assert!(record.last_error.unwrap().contains("gateway down"));

    // The sweep resubmits under the same key; the ledger now accepts.
    h.clock.advance(3600);
    assert_eq!(h.node.dispatcher().sweep_failed(86_400).unwrap(), 1);
    h.node.dispatcher().run_due().await.unwrap();

    let record = h.node.records().get_record(&hash).unwrap();
    assert_eq!(record.status, TxStatus::Confirmed);
    let confirmed = h
        .node
        .records()
        .records_by_status(TxStatus::Confirmed, 100)
        .unwrap();
    assert_eq!(confirmed.len(), 1);
}

#[tokio::test]
async fn duplicate_case_creation_anchors_once() {
    let h = harness();
    let now = h.clock.now();
    h.node
        .handle_case_change(None, &open_case("case-1"), "citizen-9", now)
        .unwrap();
    h.node.dispatcher().run_due().await.unwrap();

    let outcomes = h
        .node
        .handle_case_change(None, &open_case("case-1"), "citizen-9", now)
        .unwrap();
    assert!(matches!(outcomes[0], SubmitOutcome::AlreadyConfirmed(_)));

    h.node.dispatcher().run_due().await.unwrap();
    assert_eq!(h.ledger.submissions().len(), 1);
}

#[tokio::test]
async fn reconciler_backfills_a_record_the_mirror_never_saw() {
    let h = harness();
    let event = LifecycleEvent::new(
        CaseId::from("case-77"),
        EventType::Resolved,
        "system",
        Timestamp::new(999_000),
    );
    let payload = AnchorPayload::build(&event).unwrap();
    h.ledger.push_event(LedgerEvent {
        sequence: 1,
        tx_hash: TxHash::new([0xcd; 32]),
        payload_hash: payload.content_hash(),
        payload: payload.clone(),
        anchored_at: Timestamp::new(999_100),
    });

    let report = h.node.reconciler().sync().await.unwrap();
    assert_eq!(report.merged, 1);

    let record = h.node.records().get_record(&payload.content_hash()).unwrap();
    assert_eq!(record.status, TxStatus::Confirmed);
    assert_eq!(record.tx_hash, Some(TxHash::new([0xcd; 32])));

    // The cursor advanced past the event: a second pass merges nothing.
    let report = h.node.reconciler().sync().await.unwrap();
    assert_eq!(report.merged, 0);
}

#[tokio::test]
async fn evidence_travels_as_a_digest_in_the_event_data() {
    let h = harness();
    let outcome = h
        .node
        .anchor_evidence(
            &CaseId::from("case-1"),
            b"photo bytes",
            "pothole.jpg",
            "citizen-9",
            h.clock.now(),
        )
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Accepted(_)));

    h.node.dispatcher().run_due().await.unwrap();
    let submissions = h.ledger.submissions();
    assert_eq!(submissions.len(), 1);
    let digest = submissions[0].data.get("evidence_digest").unwrap();
    assert_eq!(digest.len(), 64);
}

#[tokio::test]
async fn node_start_and_stop_drain_cleanly() {
    let mut h = harness();
    h.node.start();
    h.node.stop().await.unwrap();
}
