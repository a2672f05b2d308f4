//! Case snapshot diffing.
//!
//! The system of record calls [`diff_case`] at mutation commit time with
//! the before and after snapshots; the returned events go straight into
//! the dispatcher. This replaces implicit save hooks with an explicit,
//! testable function.

use docket_types::{CaseId, EventType, LifecycleEvent, Timestamp};
use serde::{Deserialize, Serialize};

/// Workflow states of a case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "open",
            CaseStatus::InProgress => "in_progress",
            CaseStatus::Resolved => "resolved",
            CaseStatus::Closed => "closed",
        }
    }
}

/// The fields of a case that anchoring cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseSnapshot {
    pub case_id: CaseId,
    pub status: CaseStatus,
    pub assignee: Option<String>,
    pub category: Option<String>,
}

/// Events implied by the transition from `old` to `new`.
///
/// `old == None` means the case was just created. An assignment change
/// and a status change in the same save yield two events.
pub fn diff_case(
    old: Option<&CaseSnapshot>,
    new: &CaseSnapshot,
    actor: &str,
    now: Timestamp,
) -> Vec<LifecycleEvent> {
    let Some(old) = old else {
        let mut event = LifecycleEvent::new(new.case_id.clone(), EventType::Created, actor, now)
            .with_data("status", new.status.as_str());
        if let Some(category) = &new.category {
            event = event.with_data("category", category.clone());
        }
        return vec![event];
    };

    let mut events = Vec::new();

    if new.assignee.is_some() && old.assignee != new.assignee {
        let assignee = new.assignee.as_deref().unwrap_or_default();
        events.push(
            LifecycleEvent::new(new.case_id.clone(), EventType::Assigned, actor, now)
                .with_data("assignee", assignee),
        );
    }

    if old.status != new.status {
        let event_type = if new.status == CaseStatus::Resolved {
            EventType::Resolved
        } else {
            EventType::StatusUpdated
        };
        events.push(
            LifecycleEvent::new(new.case_id.clone(), event_type, actor, now)
                .with_data("old_status", old.status.as_str())
                .with_data("new_status", new.status.as_str()),
        );
    }

    events
}
