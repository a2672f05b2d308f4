//! Escalation notifications.
//!
//! Fire-and-forget: a notification failure is logged and never retried
//! by this subsystem. The SLA record already carries the durable truth.

use docket_types::CaseId;
use tracing::warn;

pub trait EscalationNotifier: Send + Sync {
    fn notify_escalation(&self, case_id: &CaseId);
}

/// Default notifier: a warn-level log line for operators.
pub struct LogNotifier;

impl EscalationNotifier for LogNotifier {
    fn notify_escalation(&self, case_id: &CaseId) {
        warn!(%case_id, "SLA breached, case escalated");
    }
}
