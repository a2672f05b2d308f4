//! Nullable store — thread-safe in-memory storage for testing.

use std::collections::HashMap;
use std::sync::Mutex;

use docket_store::meta::MetaStore;
use docket_store::record::{RecordStore, TransactionRecord, TxStatus};
use docket_store::sla::{SlaRecord, SlaStore};
use docket_store::sync::SyncBatch;
use docket_store::StoreError;
use docket_types::{CaseId, PayloadHash, Timestamp};

/// An in-memory record + SLA + meta store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullStore {
    records: Mutex<HashMap<[u8; 32], TransactionRecord>>,
    slas: Mutex<HashMap<String, SlaRecord>>,
    meta: Mutex<HashMap<String, Vec<u8>>>,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            slas: Mutex::new(HashMap::new()),
            meta: Mutex::new(HashMap::new()),
        }
    }

    /// Number of records currently held.
    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for NullStore {
    fn put_record(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .insert(*record.content_hash().as_bytes(), record.clone());
        Ok(())
    }

    fn get_record(&self, hash: &PayloadHash) -> Result<TransactionRecord, StoreError> {
        self.records
            .lock()
            .unwrap()
            .get(hash.as_bytes())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("record {}", hash)))
    }

    fn record_exists(&self, hash: &PayloadHash) -> Result<bool, StoreError> {
        Ok(self.records.lock().unwrap().contains_key(hash.as_bytes()))
    }

    fn records_by_status(
        &self,
        status: TxStatus,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut results: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        results.sort_by_key(|r| r.created_at);
        results.truncate(limit);
        Ok(results)
    }

    fn records_due(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut results: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| {
                r.status == TxStatus::Pending && r.next_attempt_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        results.sort_by_key(|r| r.next_attempt_at);
        results.truncate(limit);
        Ok(results)
    }

    fn delete_record(&self, hash: &PayloadHash) -> Result<(), StoreError> {
        self.records.lock().unwrap().remove(hash.as_bytes());
        Ok(())
    }
}

impl SlaStore for NullStore {
    fn put_sla(&self, record: &SlaRecord) -> Result<(), StoreError> {
        self.slas
            .lock()
            .unwrap()
            .insert(record.case_id.as_str().to_owned(), record.clone());
        Ok(())
    }

    fn get_sla(&self, case_id: &CaseId) -> Result<SlaRecord, StoreError> {
        self.slas
            .lock()
            .unwrap()
            .get(case_id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("sla for case {}", case_id)))
    }

    fn sla_exists(&self, case_id: &CaseId) -> Result<bool, StoreError> {
        Ok(self.slas.lock().unwrap().contains_key(case_id.as_str()))
    }

    fn slas_due(&self, now: Timestamp, limit: usize) -> Result<Vec<SlaRecord>, StoreError> {
        let mut results: Vec<_> = self
            .slas
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.is_active() && r.deadline <= now)
            .cloned()
            .collect();
        results.sort_by_key(|r| r.deadline);
        results.truncate(limit);
        Ok(results)
    }
}

impl MetaStore for NullStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.meta
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.meta
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("meta key '{}'", key)))
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.meta.lock().unwrap().remove(key);
        Ok(())
    }

    fn get_schema_version(&self) -> Result<u32, StoreError> {
        match self.meta.lock().unwrap().get("schema_version") {
            Some(bytes) if bytes.len() == 4 => {
                let arr: [u8; 4] = bytes.as_slice().try_into().expect("checked length");
                Ok(u32::from_le_bytes(arr))
            }
            Some(_) => Err(StoreError::Serialization(
                "schema_version has unexpected byte length".to_string(),
            )),
            None => Ok(0),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.put_meta("schema_version", &version.to_le_bytes())
    }

    fn get_sync_cursor(&self) -> Result<u64, StoreError> {
        match self.meta.lock().unwrap().get("sync_cursor") {
            Some(bytes) if bytes.len() == 8 => {
                let arr: [u8; 8] = bytes.as_slice().try_into().expect("checked length");
                Ok(u64::from_le_bytes(arr))
            }
            Some(_) => Err(StoreError::Serialization(
                "sync_cursor has unexpected byte length".to_string(),
            )),
            None => Ok(0),
        }
    }

    fn set_sync_cursor(&self, cursor: u64) -> Result<(), StoreError> {
        self.put_meta("sync_cursor", &cursor.to_le_bytes())
    }
}

impl SyncBatch for NullStore {
    fn apply_sync_batch(
        &self,
        records: &[TransactionRecord],
        cursor: u64,
    ) -> Result<(), StoreError> {
        for record in records {
            self.put_record(record)?;
        }
        self.set_sync_cursor(cursor)
    }
}
