//! Anchoring transaction records and their storage trait.

use crate::StoreError;
use docket_types::{AnchorPayload, PayloadHash, Timestamp, TxHash};
use serde::{Deserialize, Serialize};

/// Where an anchoring attempt stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    /// Submitted or awaiting (re)submission; not yet settled.
    Pending,
    /// The ledger acknowledged the payload with a transaction hash.
    Confirmed,
    /// Retries exhausted or a permanent rejection.
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        }
    }
}

/// One payload's journey to the ledger, keyed by its content hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub payload: AnchorPayload,
    pub status: TxStatus,
    /// Set once the ledger confirms the submission.
    pub tx_hash: Option<TxHash>,
    /// Submission attempts made so far (including the first).
    pub attempts: u32,
    /// Earliest time the next attempt may run. `None` once settled.
    pub next_attempt_at: Option<Timestamp>,
    /// Message from the most recent failure, kept for operators.
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TransactionRecord {
    /// Fresh record for a payload that has not been submitted yet.
    pub fn new(payload: AnchorPayload, now: Timestamp) -> Self {
        Self {
            payload,
            status: TxStatus::Pending,
            tx_hash: None,
            attempts: 0,
            next_attempt_at: Some(now),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn content_hash(&self) -> PayloadHash {
        self.payload.content_hash()
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.status, TxStatus::Confirmed | TxStatus::Failed)
    }
}

/// Persistent index of anchoring transaction records.
pub trait RecordStore {
    /// Insert or overwrite a record under its payload content hash.
    fn put_record(&self, record: &TransactionRecord) -> Result<(), StoreError>;

    /// Fetch a record by content hash.
    fn get_record(&self, hash: &PayloadHash) -> Result<TransactionRecord, StoreError>;

    /// Whether a record exists for this content hash.
    fn record_exists(&self, hash: &PayloadHash) -> Result<bool, StoreError>;

    /// All records currently in `status`, up to `limit`.
    fn records_by_status(
        &self,
        status: TxStatus,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    /// Pending records whose `next_attempt_at` is at or before `now`.
    fn records_due(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    /// Remove a record (pruning settled history).
    fn delete_record(&self, hash: &PayloadHash) -> Result<(), StoreError>;
}
