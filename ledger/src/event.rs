//! Events read back from the ledger during reconciliation.

use docket_types::{AnchorPayload, PayloadHash, Timestamp, TxHash};
use serde::{Deserialize, Serialize};

/// One anchored entry as the ledger reports it.
///
/// `sequence` is the ledger's strictly increasing position for the
/// entry; the reconciler's cursor is the highest sequence applied. The
/// full payload travels with the event so a mirror that lost (or never
/// had) the record can rebuild it from the ledger alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub sequence: u64,
    pub tx_hash: TxHash,
    pub payload_hash: PayloadHash,
    pub payload: AnchorPayload,
    pub anchored_at: Timestamp,
}
