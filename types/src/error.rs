//! Validation errors for lifecycle events.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event has an empty case id")]
    EmptyCaseId,

    #[error("event has an empty actor")]
    EmptyActor,
}
