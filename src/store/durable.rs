//! ACID-durable job store backed by redb.
//!
//! Records live in `jobs` (id → bincode record) with a unique index
//! `jobs_by_email` (email_id → id). Inserts check the index inside the same
//! write transaction, so two runs over overlapping windows stay idempotent.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::job::{JobRecord, NewJob};

use super::{JobSink, StoreResult};

/// Database file name inside the data directory.
pub const DB_FILE: &str = "jobs.redb";

const JOBS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("jobs");
const EMAIL_INDEX: TableDefinition<&str, u64> = TableDefinition::new("jobs_by_email");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_ID_KEY: &str = "next_id";

fn redb_err<E: std::fmt::Display>(op: &'static str) -> impl Fn(E) -> StoreError {
    move |e| StoreError::Redb {
        message: format!("{op} failed: {e}"),
    }
}

/// Job record store using redb.
#[derive(Clone)]
pub struct JobStore {
    db: Arc<Database>,
}

impl JobStore {
    /// Open or create the job store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Create the tables up front so read transactions never see them missing.
        let txn = db.begin_write().map_err(redb_err("begin_write"))?;
        txn.open_table(JOBS_TABLE).map_err(redb_err("open_table"))?;
        txn.open_table(EMAIL_INDEX).map_err(redb_err("open_table"))?;
        txn.open_table(META_TABLE).map_err(redb_err("open_table"))?;
        txn.commit().map_err(redb_err("commit"))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Look up a record by id.
    pub fn get(&self, id: u64) -> StoreResult<Option<JobRecord>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(JOBS_TABLE).map_err(redb_err("open_table"))?;
        let bytes = table
            .get(id)
            .map_err(redb_err("get"))?
            .map(|guard| guard.value().to_vec());
        bytes.map(|b| decode(&b)).transpose()
    }

    /// Whether a record with this dedup key exists.
    pub fn contains_email(&self, email_id: &str) -> StoreResult<bool> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let index = txn.open_table(EMAIL_INDEX).map_err(redb_err("open_table"))?;
        let found = index.get(email_id).map_err(redb_err("get"))?.is_some();
        Ok(found)
    }
}

impl JobSink for JobStore {
    fn upsert_ignoring(&self, job: NewJob) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        let inserted = {
            let mut index = txn.open_table(EMAIL_INDEX).map_err(redb_err("open_table"))?;
            let exists = index
                .get(job.email_id.as_str())
                .map_err(redb_err("get"))?
                .is_some();
            if exists {
                false
            } else {
                let mut meta = txn.open_table(META_TABLE).map_err(redb_err("open_table"))?;
                let id = meta
                    .get(NEXT_ID_KEY)
                    .map_err(redb_err("get"))?
                    .map(|guard| guard.value())
                    .unwrap_or(1);
                meta.insert(NEXT_ID_KEY, id + 1).map_err(redb_err("insert"))?;

                let record = JobRecord::from_new(id, job);
                let bytes = encode(&record)?;
                let mut jobs = txn.open_table(JOBS_TABLE).map_err(redb_err("open_table"))?;
                jobs.insert(id, bytes.as_slice()).map_err(redb_err("insert"))?;
                index
                    .insert(record.email_id.as_str(), id)
                    .map_err(redb_err("insert"))?;
                true
            }
        };
        txn.commit().map_err(redb_err("commit"))?;
        Ok(inserted)
    }

    fn list_all(&self) -> StoreResult<Vec<JobRecord>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(JOBS_TABLE).map_err(redb_err("open_table"))?;
        let mut records = Vec::new();
        for entry in table.iter().map_err(redb_err("iter"))? {
            let (_, value) = entry.map_err(redb_err("iter"))?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }

    fn clear_all(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        {
            let mut jobs = txn.open_table(JOBS_TABLE).map_err(redb_err("open_table"))?;
            jobs.retain(|_, _| false).map_err(redb_err("retain"))?;
            let mut index = txn.open_table(EMAIL_INDEX).map_err(redb_err("open_table"))?;
            index.retain(|_, _| false).map_err(redb_err("retain"))?;
        }
        txn.commit().map_err(redb_err("commit"))?;
        tracing::info!("cleared all job records");
        Ok(())
    }

    fn delete(&self, id: u64) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        let existed = {
            let mut jobs = txn.open_table(JOBS_TABLE).map_err(redb_err("open_table"))?;
            let removed = jobs
                .remove(id)
                .map_err(redb_err("remove"))?
                .map(|guard| guard.value().to_vec());
            match removed {
                Some(bytes) => {
                    let record = decode(&bytes)?;
                    let mut index =
                        txn.open_table(EMAIL_INDEX).map_err(redb_err("open_table"))?;
                    index
                        .remove(record.email_id.as_str())
                        .map_err(redb_err("remove"))?;
                    true
                }
                None => false,
            }
        };
        txn.commit().map_err(redb_err("commit"))?;
        Ok(existed)
    }
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore").finish()
    }
}

fn encode(record: &JobRecord) -> StoreResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| StoreError::Codec {
        message: e.to_string(),
    })
}

fn decode(bytes: &[u8]) -> StoreResult<JobRecord> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Codec {
        message: e.to_string(),
    })
}
