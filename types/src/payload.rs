//! Canonical anchor payloads.
//!
//! An `AnchorPayload` is the exact record submitted to the ledger for a
//! lifecycle event. Its canonical byte encoding is length-prefixed and
//! field-ordered, so the same event always produces the same bytes and
//! therefore the same content hash. The content hash is the idempotency
//! key: resubmitting an identical payload cannot anchor a duplicate.

use crate::case::{CaseId, EventType};
use crate::error::EventError;
use crate::event::LifecycleEvent;
use crate::hash::PayloadHash;
use crate::time::Timestamp;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type Blake2b256 = Blake2b<U32>;

/// Version tag baked into every canonical encoding. Bump when the
/// encoding changes shape so old hashes cannot collide with new ones.
pub const PAYLOAD_SCHEMA_VERSION: u16 = 1;

/// The record anchored to the ledger for one lifecycle event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorPayload {
    pub schema_version: u16,
    pub case_id: CaseId,
    pub event_type: EventType,
    pub actor: String,
    pub occurred_at: Timestamp,
    pub data: BTreeMap<String, String>,
}

impl AnchorPayload {
    /// Build the payload for an event, validating it first.
    pub fn build(event: &LifecycleEvent) -> Result<Self, EventError> {
        event.validate()?;
        Ok(Self {
            schema_version: PAYLOAD_SCHEMA_VERSION,
            case_id: event.case_id.clone(),
            event_type: event.event_type,
            actor: event.actor.clone(),
            occurred_at: event.occurred_at,
            data: event.data.clone(),
        })
    }

    /// Canonical byte encoding: fixed-width integers big-endian, strings
    /// length-prefixed with a u32, map entries in key order.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.schema_version.to_be_bytes());
        put_str(&mut out, self.case_id.as_str());
        put_str(&mut out, self.event_type.as_str());
        put_str(&mut out, &self.actor);
        out.extend_from_slice(&self.occurred_at.as_secs().to_be_bytes());
        out.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        for (key, value) in &self.data {
            put_str(&mut out, key);
            put_str(&mut out, value);
        }
        out
    }

    /// Blake2b-256 of the canonical encoding.
    pub fn content_hash(&self) -> PayloadHash {
        let mut hasher = Blake2b256::new();
        hasher.update(self.canonical_bytes());
        let result = hasher.finalize();
        let mut output = [0u8; 32];
        output.copy_from_slice(&result);
        PayloadHash::new(output)
    }
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}
