//! Atomic application of one reconciliation batch.

use crate::record::TransactionRecord;
use crate::StoreError;

/// Applies a merged batch of record upserts plus the new sync cursor in
/// one durable step, so a crash mid-batch never leaves the cursor ahead
/// of the records it covers.
pub trait SyncBatch {
    fn apply_sync_batch(
        &self,
        records: &[TransactionRecord],
        cursor: u64,
    ) -> Result<(), StoreError>;
}
