//! Abstract storage traits for docket.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.

pub mod error;
pub mod meta;
pub mod record;
pub mod sla;
pub mod sync;

pub use error::StoreError;
pub use meta::MetaStore;
pub use record::{RecordStore, TransactionRecord, TxStatus};
pub use sla::{SlaRecord, SlaStore};
pub use sync::SyncBatch;
