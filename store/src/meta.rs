//! Metadata storage trait.

use crate::StoreError;

/// Generic key-value store for internal bookkeeping that doesn't belong
/// in any domain-specific store: schema version, the ledger sync cursor.
pub trait MetaStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    fn delete_meta(&self, key: &str) -> Result<(), StoreError>;

    /// Current database schema version (convenience wrapper).
    fn get_schema_version(&self) -> Result<u32, StoreError>;

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError>;

    /// Sequence number of the last ledger event applied by the
    /// reconciler. Zero when no event has been applied yet.
    fn get_sync_cursor(&self) -> Result<u64, StoreError>;

    fn set_sync_cursor(&self, cursor: u64) -> Result<(), StoreError>;
}
