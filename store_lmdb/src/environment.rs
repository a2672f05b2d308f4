//! LMDB environment setup and store handles.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use docket_store::record::TransactionRecord;
use docket_store::sync::SyncBatch;
use docket_store::StoreError;

use crate::meta::LmdbMetaStore;
use crate::record::LmdbRecordStore;
use crate::sla::LmdbSlaStore;
use crate::write_batch::WriteBatch;
use crate::LmdbError;

/// 1 GiB map size. Anchoring records are small; this leaves ample room.
const MAP_SIZE: usize = 1024 * 1024 * 1024;
const MAX_DBS: u32 = 8;

/// One LMDB environment holding all docket databases.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    /// payload content hash -> bincode TransactionRecord
    pub(crate) records_db: Database<Bytes, Bytes>,
    /// deadline(u64 BE) ++ case_id -> bincode SlaRecord
    pub(crate) slas_db: Database<Bytes, Bytes>,
    /// case_id -> deadline(u64 BE), reverse index into `slas_db`
    pub(crate) sla_index_db: Database<Bytes, Bytes>,
    /// bookkeeping: schema version, sync cursor
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open (or create) the environment at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)
            .map_err(|e| StoreError::Backend(format!("create data dir: {}", e)))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE)
                .max_dbs(MAX_DBS)
                .open(path)
                .map_err(LmdbError::from)?
        };

        let mut wtxn = env.write_txn().map_err(LmdbError::from)?;
        let records_db = env
            .create_database(&mut wtxn, Some("records"))
            .map_err(LmdbError::from)?;
        let slas_db = env
            .create_database(&mut wtxn, Some("slas"))
            .map_err(LmdbError::from)?;
        let sla_index_db = env
            .create_database(&mut wtxn, Some("sla_index"))
            .map_err(LmdbError::from)?;
        let meta_db = env
            .create_database(&mut wtxn, Some("meta"))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        Ok(Self {
            env: Arc::new(env),
            records_db,
            slas_db,
            sla_index_db,
            meta_db,
        })
    }

    pub(crate) fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn record_store(&self) -> LmdbRecordStore {
        LmdbRecordStore {
            env: Arc::clone(&self.env),
            records_db: self.records_db,
        }
    }

    pub fn sla_store(&self) -> LmdbSlaStore {
        LmdbSlaStore {
            env: Arc::clone(&self.env),
            slas_db: self.slas_db,
            sla_index_db: self.sla_index_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }

    /// Begin a write batch covering all databases.
    pub fn write_batch(&self) -> Result<WriteBatch<'_>, StoreError> {
        WriteBatch::new(self)
    }
}

impl SyncBatch for LmdbEnvironment {
    fn apply_sync_batch(
        &self,
        records: &[TransactionRecord],
        cursor: u64,
    ) -> Result<(), StoreError> {
        let mut batch = self.write_batch()?;
        for record in records {
            batch.put_record(record)?;
        }
        batch.set_sync_cursor(cursor)?;
        batch.commit()
    }
}
