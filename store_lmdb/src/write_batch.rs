//! Write batching. Groups multiple store operations into a single LMDB
//! write transaction, amortising the cost of the fsync each commit pays.
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! operations are rolled back (the underlying LMDB transaction aborts).

use heed::RwTxn;

use docket_store::record::TransactionRecord;
use docket_store::sla::SlaRecord;
use docket_store::StoreError;

use crate::environment::LmdbEnvironment;
use crate::meta::SYNC_CURSOR_KEY;
use crate::sla::{deadline_bytes, sla_key};
use crate::LmdbError;

pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a LmdbEnvironment,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, StoreError> {
        let txn = env.env().write_txn().map_err(LmdbError::from)?;
        Ok(Self { txn, env })
    }

    /// Insert or overwrite a transaction record.
    pub fn put_record(&mut self, record: &TransactionRecord) -> Result<(), StoreError> {
        let key = record.content_hash();
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        self.env
            .records_db
            .put(&mut self.txn, key.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    /// Insert or overwrite an SLA record, keeping the reverse index and
    /// the deadline-ordered table in step.
    pub fn put_sla(&mut self, record: &SlaRecord) -> Result<(), StoreError> {
        let old_deadline = self
            .env
            .sla_index_db
            .get(&self.txn, record.case_id.as_bytes())
            .map_err(LmdbError::from)?
            .map(|bytes| {
                let arr: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| LmdbError::Serialization("invalid deadline byte length".into()))?;
                Ok::<_, LmdbError>(docket_types::Timestamp::new(u64::from_be_bytes(arr)))
            })
            .transpose()?;
        if let Some(old_deadline) = old_deadline {
            if old_deadline != record.deadline {
                let old_key = sla_key(old_deadline, &record.case_id);
                self.env
                    .slas_db
                    .delete(&mut self.txn, &old_key)
                    .map_err(LmdbError::from)?;
            }
        }

        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        let key = sla_key(record.deadline, &record.case_id);
        self.env
            .slas_db
            .put(&mut self.txn, &key, &bytes)
            .map_err(LmdbError::from)?;
        self.env
            .sla_index_db
            .put(
                &mut self.txn,
                record.case_id.as_bytes(),
                &deadline_bytes(record.deadline),
            )
            .map_err(LmdbError::from)?;
        Ok(())
    }

    /// Advance the ledger sync cursor.
    pub fn set_sync_cursor(&mut self, cursor: u64) -> Result<(), StoreError> {
        self.env
            .meta_db
            .put(&mut self.txn, SYNC_CURSOR_KEY, &cursor.to_le_bytes())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    /// Commit everything in one fsync.
    pub fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use docket_store::record::{RecordStore, TransactionRecord, TxStatus};
    use docket_store::sla::{SlaRecord, SlaStore};
    use docket_store::meta::MetaStore;
    use docket_types::{AnchorPayload, CaseId, EventType, LifecycleEvent, Timestamp};

    use crate::LmdbEnvironment;

    fn payload(case: &str, secs: u64) -> AnchorPayload {
        let ev = LifecycleEvent::new(
            CaseId::from(case),
            EventType::Created,
            "citizen-1",
            Timestamp::new(secs),
        );
        AnchorPayload::build(&ev).unwrap()
    }

    fn open_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path()).unwrap();
        (dir, env)
    }

    #[test]
    fn batch_commits_record_sla_and_cursor_atomically() {
        let (_dir, env) = open_env();
        let now = Timestamp::new(1_000);
        let record = TransactionRecord::new(payload("case-1", 1_000), now);
        let sla = SlaRecord::new(CaseId::from("case-1"), Timestamp::new(2_000), now);

        let mut batch = env.write_batch().unwrap();
        batch.put_record(&record).unwrap();
        batch.put_sla(&sla).unwrap();
        batch.set_sync_cursor(7).unwrap();
        batch.commit().unwrap();

        let records = env.record_store();
        let got = records.get_record(&record.content_hash()).unwrap();
        assert_eq!(got.status, TxStatus::Pending);
        assert_eq!(env.sla_store().get_sla(&CaseId::from("case-1")).unwrap(), sla);
        assert_eq!(env.meta_store().get_sync_cursor().unwrap(), 7);
    }

    #[test]
    fn dropped_batch_rolls_back() {
        let (_dir, env) = open_env();
        let now = Timestamp::new(1_000);
        let record = TransactionRecord::new(payload("case-2", 1_000), now);

        {
            let mut batch = env.write_batch().unwrap();
            batch.put_record(&record).unwrap();
            // no commit
        }

        assert!(!env.record_store().record_exists(&record.content_hash()).unwrap());
    }

    #[test]
    fn batch_put_sla_with_moved_deadline_leaves_one_entry() {
        let (_dir, env) = open_env();
        let now = Timestamp::new(1_000);
        let mut sla = SlaRecord::new(CaseId::from("case-3"), Timestamp::new(5_000), now);
        env.sla_store().put_sla(&sla).unwrap();

        sla.deadline = Timestamp::new(9_000);
        let mut batch = env.write_batch().unwrap();
        batch.put_sla(&sla).unwrap();
        batch.commit().unwrap();

        let due = env.sla_store().slas_due(Timestamp::new(10_000), 10).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].deadline, Timestamp::new(9_000));
    }
}
