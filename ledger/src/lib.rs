//! Gateway to the external append-only ledger.
//!
//! The node talks to the ledger only through the [`LedgerClient`] trait.
//! Production uses [`HttpLedgerClient`]; tests use the scripted null
//! client from `docket-nullables`.

pub mod client;
pub mod error;
pub mod event;

pub use client::{HttpLedgerClient, LedgerClient, SubmitReceipt};
pub use error::LedgerError;
pub use event::LedgerEvent;
