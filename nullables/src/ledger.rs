//! Nullable ledger — scripted responses and recorded calls for testing.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use docket_ledger::{LedgerClient, LedgerError, LedgerEvent, SubmitReceipt};
use docket_types::{AnchorPayload, CaseId, TxHash};

/// What the next scripted call should do.
#[derive(Clone, Debug)]
pub enum ScriptedOutcome {
    Confirm(TxHash),
    Timeout,
    Transport(String),
    Rejected(String),
    Http(u16),
}

impl ScriptedOutcome {
    fn into_result(self) -> Result<SubmitReceipt, LedgerError> {
        match self {
            ScriptedOutcome::Confirm(tx_hash) => Ok(SubmitReceipt { tx_hash }),
            ScriptedOutcome::Timeout => Err(LedgerError::Timeout),
            ScriptedOutcome::Transport(msg) => Err(LedgerError::Transport(msg)),
            ScriptedOutcome::Rejected(msg) => Err(LedgerError::Rejected(msg)),
            ScriptedOutcome::Http(status) => Err(LedgerError::Http(status)),
        }
    }
}

/// An in-memory ledger for testing.
///
/// Submissions consume scripted outcomes in order; once the script runs
/// out, every submission confirms with a tx hash derived from the
/// payload's content hash. All calls are recorded for inspection.
pub struct NullLedger {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    submitted: Mutex<Vec<AnchorPayload>>,
    escalated: Mutex<BTreeSet<CaseId>>,
    events: Mutex<Vec<LedgerEvent>>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            escalated: Mutex::new(BTreeSet::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Queue the outcome for the next unscripted submission.
    pub fn script(&self, outcome: ScriptedOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Payloads submitted so far, in order.
    pub fn submissions(&self) -> Vec<AnchorPayload> {
        self.submitted.lock().unwrap().clone()
    }

    /// Cases escalated so far.
    pub fn escalations(&self) -> Vec<CaseId> {
        self.escalated.lock().unwrap().iter().cloned().collect()
    }

    /// Pretend a case was already escalated by someone else.
    pub fn mark_escalated(&self, case_id: CaseId) {
        self.escalated.lock().unwrap().insert(case_id);
    }

    /// Append an event to the feed served by `events_since`.
    pub fn push_event(&self, event: LedgerEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn next_outcome(&self) -> Option<ScriptedOutcome> {
        self.script.lock().unwrap().pop_front()
    }

    fn default_receipt(payload: &AnchorPayload) -> SubmitReceipt {
        SubmitReceipt {
            tx_hash: TxHash::new(*payload.content_hash().as_bytes()),
        }
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for NullLedger {
    async fn submit(&self, payload: &AnchorPayload) -> Result<SubmitReceipt, LedgerError> {
        self.submitted.lock().unwrap().push(payload.clone());
        match self.next_outcome() {
            Some(outcome) => outcome.into_result(),
            None => Ok(Self::default_receipt(payload)),
        }
    }

    async fn escalate(&self, case_id: &CaseId) -> Result<SubmitReceipt, LedgerError> {
        if let Some(outcome) = self.next_outcome() {
            let receipt = outcome.into_result()?;
            self.escalated.lock().unwrap().insert(case_id.clone());
            return Ok(receipt);
        }
        self.escalated.lock().unwrap().insert(case_id.clone());
        Ok(SubmitReceipt {
            tx_hash: TxHash::new([0xee; 32]),
        })
    }

    async fn is_escalated(&self, case_id: &CaseId) -> Result<bool, LedgerError> {
        Ok(self.escalated.lock().unwrap().contains(case_id))
    }

    async fn events_since(
        &self,
        after: u64,
        limit: usize,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        let events = self.events.lock().unwrap();
        Ok(events
            .iter()
            .filter(|ev| ev.sequence > after)
            .take(limit)
            .cloned()
            .collect())
    }
}
