//! Case identifiers and lifecycle event kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a case record in the system of record.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseId(String);

impl CaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CaseId({})", self.0)
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CaseId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// The kinds of lifecycle transitions a case can go through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Created,
    Assigned,
    StatusUpdated,
    Resolved,
    Escalated,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Created => "CREATED",
            EventType::Assigned => "ASSIGNED",
            EventType::StatusUpdated => "STATUS_UPDATED",
            EventType::Resolved => "RESOLVED",
            EventType::Escalated => "ESCALATED",
        }
    }

    /// Parse an event type from its canonical wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(EventType::Created),
            "ASSIGNED" => Some(EventType::Assigned),
            "STATUS_UPDATED" => Some(EventType::StatusUpdated),
            "RESOLVED" => Some(EventType::Resolved),
            "ESCALATED" => Some(EventType::Escalated),
            _ => None,
        }
    }

    /// Whether this event terminates a case's SLA window.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::Resolved)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_canonical_name() {
        for ty in [
            EventType::Created,
            EventType::Assigned,
            EventType::StatusUpdated,
            EventType::Resolved,
            EventType::Escalated,
        ] {
            assert_eq!(EventType::parse(ty.as_str()), Some(ty));
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        assert_eq!(EventType::parse("DELETED"), None);
        assert_eq!(EventType::parse("created"), None);
    }

    #[test]
    fn only_resolved_is_terminal() {
        assert!(EventType::Resolved.is_terminal());
        assert!(!EventType::Created.is_terminal());
        assert!(!EventType::Escalated.is_terminal());
    }
}
