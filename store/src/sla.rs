//! SLA deadline records and their storage trait.

use crate::StoreError;
use docket_types::{CaseId, Timestamp};
use serde::{Deserialize, Serialize};

/// The resolution deadline tracked for one case.
///
/// Records are kept after resolution and escalation for audit; scans
/// only consider active ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaRecord {
    pub case_id: CaseId,
    pub deadline: Timestamp,
    pub escalated: bool,
    pub created_at: Timestamp,
    pub escalated_at: Option<Timestamp>,
    pub resolved_at: Option<Timestamp>,
}

impl SlaRecord {
    pub fn new(case_id: CaseId, deadline: Timestamp, now: Timestamp) -> Self {
        Self {
            case_id,
            deadline,
            escalated: false,
            created_at: now,
            escalated_at: None,
            resolved_at: None,
        }
    }

    pub fn is_breached(&self, now: Timestamp) -> bool {
        now >= self.deadline
    }

    /// Still eligible for escalation scans.
    pub fn is_active(&self) -> bool {
        !self.escalated && self.resolved_at.is_none()
    }
}

/// Persistent index of SLA deadlines, scannable in deadline order.
pub trait SlaStore {
    fn put_sla(&self, record: &SlaRecord) -> Result<(), StoreError>;

    fn get_sla(&self, case_id: &CaseId) -> Result<SlaRecord, StoreError>;

    fn sla_exists(&self, case_id: &CaseId) -> Result<bool, StoreError>;

    /// Active records with `deadline <= now`, deadline-ascending, up to
    /// `limit`. Escalated and resolved records are skipped.
    fn slas_due(&self, now: Timestamp, limit: usize) -> Result<Vec<SlaRecord>, StoreError>;
}
