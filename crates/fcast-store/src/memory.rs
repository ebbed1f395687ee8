//! In-memory document store

use crate::{DocumentStore, StoreError, StoreResult, UpsertResult, UpsertStatus};
use fcast_core::{InstantDocument, InstantKey, Upsert};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Document store kept in process memory.
///
/// Every operation holds the lock for its full duration, which gives the same
/// per-key atomicity as the database upsert.
pub struct MemoryStore {
    name: String,
    documents: Mutex<BTreeMap<InstantKey, InstantDocument>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Mutex::new(BTreeMap::new()),
        }
    }

    /// Snapshot of every document, ordered by key
    pub async fn documents(&self) -> Vec<InstantDocument> {
        self.documents.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one_and_update(&self, upsert: &Upsert) -> StoreResult<UpsertResult> {
        let mut documents = self.documents.lock().await;
        let status = if documents.contains_key(&upsert.key) {
            UpsertStatus::Updated
        } else {
            UpsertStatus::Created
        };

        let document = documents
            .entry(upsert.key.clone())
            .or_insert_with(|| InstantDocument::new(upsert.key.clone(), upsert.location));
        document.apply(&upsert.update);
        debug!(store = %self.name, key = %upsert.key, ?status, "Upserted instant document");

        Ok(UpsertResult {
            status,
            document: document.clone(),
        })
    }

    async fn find_one(&self, key: &InstantKey) -> StoreResult<Option<InstantDocument>> {
        Ok(self.documents.lock().await.get(key).cloned())
    }

    async fn replace_one(&self, document: &InstantDocument) -> StoreResult<UpsertStatus> {
        let previous = self
            .documents
            .lock()
            .await
            .insert(document.key(), document.clone());
        Ok(match previous {
            Some(_) => UpsertStatus::Updated,
            None => UpsertStatus::Created,
        })
    }

    async fn insert_one(&self, document: &InstantDocument) -> StoreResult<()> {
        let mut documents = self.documents.lock().await;
        let key = document.key();
        if documents.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                index: format!("{}.PRIMARY ({})", self.name, key),
            });
        }
        documents.insert(key, document.clone());
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
