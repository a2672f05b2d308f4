//! Fundamental types shared across the docket crates.
//!
//! Everything here is plain data: case identifiers, lifecycle events,
//! the canonical anchor payload, hash newtypes, and timestamps. No I/O,
//! no storage, no network.

pub mod case;
pub mod error;
pub mod event;
pub mod hash;
pub mod payload;
pub mod time;

pub use case::{CaseId, EventType};
pub use error::EventError;
pub use event::LifecycleEvent;
pub use hash::{PayloadHash, TxHash};
pub use payload::{AnchorPayload, PAYLOAD_SCHEMA_VERSION};
pub use time::{Clock, SystemClock, Timestamp};
