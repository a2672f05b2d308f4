//! LMDB implementation of RecordStore.
//!
//! Records are keyed by the 32-byte payload content hash. Status and
//! due-time scans walk the whole table; record volume here is bounded by
//! retention, so a full scan stays cheap.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use docket_store::record::{RecordStore, TransactionRecord, TxStatus};
use docket_store::StoreError;
use docket_types::{PayloadHash, Timestamp};

use crate::LmdbError;

pub struct LmdbRecordStore {
    pub(crate) env: Arc<Env>,
    pub(crate) records_db: Database<Bytes, Bytes>,
}

impl RecordStore for LmdbRecordStore {
    fn put_record(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        let key = record.content_hash();
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.records_db
            .put(&mut wtxn, key.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_record(&self, hash: &PayloadHash) -> Result<TransactionRecord, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .records_db
            .get(&rtxn, hash.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("record {}", hash)))?;
        let record: TransactionRecord = bincode::deserialize(val).map_err(LmdbError::from)?;
        Ok(record)
    }

    fn record_exists(&self, hash: &PayloadHash) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .records_db
            .get(&rtxn, hash.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.is_some())
    }

    fn records_by_status(
        &self,
        status: TxStatus,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.records_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for result in iter {
            let (_key, val) = result.map_err(LmdbError::from)?;
            let record: TransactionRecord = bincode::deserialize(val).map_err(LmdbError::from)?;
            if record.status == status {
                results.push(record);
                if results.len() >= limit {
                    break;
                }
            }
        }
        Ok(results)
    }

    fn records_due(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.records_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for result in iter {
            let (_key, val) = result.map_err(LmdbError::from)?;
            let record: TransactionRecord = bincode::deserialize(val).map_err(LmdbError::from)?;
            let due = record.status == TxStatus::Pending
                && record.next_attempt_at.is_some_and(|at| at <= now);
            if due {
                results.push(record);
                if results.len() >= limit {
                    break;
                }
            }
        }
        Ok(results)
    }

    fn delete_record(&self, hash: &PayloadHash) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.records_db
            .delete(&mut wtxn, hash.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
