//! Instant document reconciliation and replication
//!
//! The [`Reconciler`] merges normalized records into the local staging store
//! with one atomic upsert per record. The [`Replicator`] pushes the resulting
//! documents, whole, to the remote store of record.

pub mod reconciler;
pub mod replicator;

pub use reconciler::*;
pub use replicator::*;

use fcast_store::{StoreError, UpsertStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The store reported a uniqueness violation; never retried here
    #[error("Conflicting write on {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl ReconcileError {
    /// Whether the local store itself is gone, as opposed to one bad write
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ReconcileError::Store(e) if e.is_unavailable())
    }
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { index } => ReconcileError::Conflict(index),
            other => ReconcileError::Store(other),
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
}

impl From<UpsertStatus> for ReconcileOutcome {
    fn from(status: UpsertStatus) -> Self {
        match status {
            UpsertStatus::Created => ReconcileOutcome::Created,
            UpsertStatus::Updated => ReconcileOutcome::Updated,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReplicateError {
    #[error("Local store unavailable: {0}")]
    LocalUnavailable(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationOutcome {
    /// Remote now holds the local document
    Propagated,
    /// Remote refused the write as a duplicate and was left untouched
    AlreadyPresent,
    Failed(String),
}
