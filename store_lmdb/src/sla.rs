//! LMDB implementation of SlaStore.
//!
//! Key format in `slas_db`: `deadline (u64 BE) ++ case_id bytes`, so a
//! forward iteration visits records in deadline order. `sla_index_db`
//! maps `case_id -> deadline bytes` to make per-case lookups possible
//! without knowing the deadline.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use docket_store::sla::{SlaRecord, SlaStore};
use docket_store::StoreError;
use docket_types::{CaseId, Timestamp};

use crate::LmdbError;

pub struct LmdbSlaStore {
    pub(crate) env: Arc<Env>,
    pub(crate) slas_db: Database<Bytes, Bytes>,
    pub(crate) sla_index_db: Database<Bytes, Bytes>,
}

/// Composite key `deadline_be ++ case_id`.
pub(crate) fn sla_key(deadline: Timestamp, case_id: &CaseId) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + case_id.as_bytes().len());
    key.extend_from_slice(&deadline.as_secs().to_be_bytes());
    key.extend_from_slice(case_id.as_bytes());
    key
}

/// Deadline prefix recorded in the reverse index.
pub(crate) fn deadline_bytes(deadline: Timestamp) -> [u8; 8] {
    deadline.as_secs().to_be_bytes()
}

fn parse_deadline(bytes: &[u8]) -> Result<Timestamp, LmdbError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LmdbError::Serialization("invalid deadline byte length".into()))?;
    Ok(Timestamp::new(u64::from_be_bytes(arr)))
}

impl SlaStore for LmdbSlaStore {
    fn put_sla(&self, record: &SlaRecord) -> Result<(), StoreError> {
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        // A re-put with a different deadline must not leave the old
        // composite entry behind.
        let old_deadline = self
            .sla_index_db
            .get(&wtxn, record.case_id.as_bytes())
            .map_err(LmdbError::from)?
            .map(parse_deadline)
            .transpose()?;
        if let Some(old_deadline) = old_deadline {
            if old_deadline != record.deadline {
                let old_key = sla_key(old_deadline, &record.case_id);
                self.slas_db
                    .delete(&mut wtxn, &old_key)
                    .map_err(LmdbError::from)?;
            }
        }

        let key = sla_key(record.deadline, &record.case_id);
        self.slas_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        self.sla_index_db
            .put(
                &mut wtxn,
                record.case_id.as_bytes(),
                &deadline_bytes(record.deadline),
            )
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_sla(&self, case_id: &CaseId) -> Result<SlaRecord, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let deadline = self
            .sla_index_db
            .get(&rtxn, case_id.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("sla for case {}", case_id)))?;
        let key = sla_key(parse_deadline(deadline)?, case_id);
        let val = self
            .slas_db
            .get(&rtxn, &key)
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("sla for case {}", case_id)))?;
        let record: SlaRecord = bincode::deserialize(val).map_err(LmdbError::from)?;
        Ok(record)
    }

    fn sla_exists(&self, case_id: &CaseId) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .sla_index_db
            .get(&rtxn, case_id.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.is_some())
    }

    fn slas_due(&self, now: Timestamp, limit: usize) -> Result<Vec<SlaRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.slas_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for result in iter {
            let (key, val) = result.map_err(LmdbError::from)?;
            let deadline = parse_deadline(&key[..8.min(key.len())])?;
            if deadline > now {
                break;
            }
            let record: SlaRecord = bincode::deserialize(val).map_err(LmdbError::from)?;
            if record.is_active() {
                results.push(record);
                if results.len() >= limit {
                    break;
                }
            }
        }
        Ok(results)
    }
}
