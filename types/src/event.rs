//! Lifecycle events emitted by the system of record.

use crate::case::{CaseId, EventType};
use crate::error::EventError;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single lifecycle transition of a case, as observed at the source.
///
/// The `data` map carries event-specific detail (assignee, old/new
/// status, resolution notes). A `BTreeMap` keeps iteration order
/// deterministic so two equal events always canonicalize identically.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub case_id: CaseId,
    pub event_type: EventType,
    pub actor: String,
    pub occurred_at: Timestamp,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl LifecycleEvent {
    pub fn new(
        case_id: CaseId,
        event_type: EventType,
        actor: impl Into<String>,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            case_id,
            event_type,
            actor: actor.into(),
            occurred_at,
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Validate the event before it is accepted for anchoring.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.case_id.is_empty() {
            return Err(EventError::EmptyCaseId);
        }
        if self.actor.is_empty() {
            return Err(EventError::EmptyActor);
        }
        Ok(())
    }
}
