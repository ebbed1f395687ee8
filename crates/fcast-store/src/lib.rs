//! Document store access for instant documents
//!
//! Two backends implement [`DocumentStore`]: a MySQL store holding each
//! instant document as JSON columns under a `(zipcode, instant)` primary key,
//! and an in-memory store used for dry runs and tests. The local staging
//! store and the remote store of record are separate instances of the same
//! trait.

pub mod client;
pub mod memory;
pub mod queries;
pub mod schema;

pub use client::*;
pub use memory::*;

use fcast_core::{InstantDocument, InstantKey, Upsert};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Duplicate key on {index}")]
    DuplicateKey { index: String },

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl StoreError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                let index = db
                    .constraint()
                    .map(str::to_string)
                    .unwrap_or_else(|| db.message().to_string());
                return StoreError::DuplicateKey { index };
            }
        }
        if matches!(
            err,
            sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        ) {
            return StoreError::Unavailable(err.to_string());
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Whether a keyed write created the document or changed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStatus {
    Created,
    Updated,
}

/// Outcome of a find-one-and-update: status plus the document after the update
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertResult {
    pub status: UpsertStatus,
    pub document: InstantDocument,
}

/// Per-batch result of [`DocumentStore::bulk_write`]
#[derive(Debug, Default)]
pub struct BulkWriteSummary {
    pub created: usize,
    pub updated: usize,

    /// Failed operations by position in the submitted batch
    pub failed: Vec<(usize, StoreError)>,
}

impl BulkWriteSummary {
    pub fn record(&mut self, status: UpsertStatus) {
        match status {
            UpsertStatus::Created => self.created += 1,
            UpsertStatus::Updated => self.updated += 1,
        }
    }
}

/// Keyed document collection
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store name for logs ("local", "remote", ...)
    fn name(&self) -> &str;

    /// Apply `upsert.update` to the document matching `upsert.key`, creating
    /// it first when absent. Filter and update run as one atomic operation.
    async fn find_one_and_update(&self, upsert: &Upsert) -> StoreResult<UpsertResult>;

    /// Read one document by key
    async fn find_one(&self, key: &InstantKey) -> StoreResult<Option<InstantDocument>>;

    /// Replace the document with the same key, inserting it when absent
    async fn replace_one(&self, document: &InstantDocument) -> StoreResult<UpsertStatus>;

    /// Insert a new document; fails with `DuplicateKey` if the key exists
    async fn insert_one(&self, document: &InstantDocument) -> StoreResult<()>;

    /// Apply upserts in order. Individual failures are collected and the
    /// remaining operations still run; an unavailable store aborts the batch.
    async fn bulk_write(&self, upserts: &[Upsert]) -> StoreResult<BulkWriteSummary> {
        let mut summary = BulkWriteSummary::default();
        for (index, upsert) in upserts.iter().enumerate() {
            match self.find_one_and_update(upsert).await {
                Ok(result) => summary.record(result.status),
                Err(e) if e.is_unavailable() => return Err(e),
                Err(e) => summary.failed.push((index, e)),
            }
        }
        Ok(summary)
    }

    /// Check that the store is reachable
    async fn ping(&self) -> StoreResult<()>;
}
