//! Persistence sink for job records.
//!
//! [`JobSink`] is the interface the ingestion pipeline and the CLI use;
//! [`JobStore`] implements it on redb with insert-or-ignore semantics keyed by
//! `email_id`.

pub mod durable;

pub use durable::JobStore;

use crate::error::StoreError;
use crate::job::{JobRecord, NewJob};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Append-mostly job record storage with dedup-on-conflict.
pub trait JobSink {
    /// Insert `job` unless a record with the same `email_id` exists.
    ///
    /// Returns `Ok(true)` when inserted and `Ok(false)` when the record was a
    /// duplicate and silently dropped. Existing records are never overwritten.
    fn upsert_ignoring(&self, job: NewJob) -> StoreResult<bool>;

    /// All records in insertion order.
    fn list_all(&self) -> StoreResult<Vec<JobRecord>>;

    /// Remove every record.
    fn clear_all(&self) -> StoreResult<()>;

    /// Remove one record by id. Returns whether it existed.
    fn delete(&self, id: u64) -> StoreResult<bool>;
}
