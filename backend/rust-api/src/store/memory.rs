//! In-process document store.
//!
//! Used by `STORE_BACKEND=memory` for local runs and by the test suites.
//! Faults can be injected per store so callers can exercise connection,
//! enumeration and partial-write failures deterministically.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mongodb::bson::Document;
use uuid::Uuid;

use super::{
    BatchOutcome, CollectionRef, DocumentStream, NewRecord, StoreConnector, StoreError,
    StoreSession, StoredDocument,
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<CollectionRef, Vec<StoredDocument>>,
    fail_connect: bool,
    fail_reads_after: Option<usize>,
    failing_writes: HashSet<usize>,
    reject_writes: bool,
    sessions_opened: usize,
    sessions_closed: usize,
    writes_attempted: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a document under an explicit key, bypassing sessions.
    pub fn insert(&self, collection: &CollectionRef, key: impl Into<String>, data: Document) {
        self.lock()
            .collections
            .entry(collection.clone())
            .or_default()
            .push(StoredDocument {
                key: key.into(),
                data,
            });
    }

    pub fn documents_in(&self, collection: &CollectionRef) -> Vec<StoredDocument> {
        self.lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_connections(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    /// Makes enumerations break after yielding `count` documents.
    pub fn fail_reads_after(&self, count: Option<usize>) {
        self.lock().fail_reads_after = count;
    }

    /// Makes the writes at these batch positions fail in every later batch.
    pub fn fail_writes_at(&self, indices: impl IntoIterator<Item = usize>) {
        self.lock().failing_writes = indices.into_iter().collect();
    }

    pub fn reject_writes(&self, reject: bool) {
        self.lock().reject_writes = reject;
    }

    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions_opened
    }

    /// Sessions handed out and not yet closed.
    pub fn open_sessions(&self) -> usize {
        let inner = self.lock();
        inner.sessions_opened - inner.sessions_closed
    }

    /// Individual writes submitted through batches, accepted or not.
    pub fn writes_attempted(&self) -> usize {
        self.lock().writes_attempted
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let mut inner = self.lock();
        if inner.fail_connect {
            return Err(StoreError::Connect("memory store is unavailable".to_string()));
        }
        inner.sessions_opened += 1;
        Ok(Box::new(MemorySession {
            store: self.clone(),
        }))
    }
}

struct MemorySession {
    store: MemoryStore,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn documents(&self, collection: &CollectionRef) -> Result<DocumentStream, StoreError> {
        let inner = self.store.lock();
        let documents = inner
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default();

        let mut items: Vec<Result<StoredDocument, StoreError>> = match inner.fail_reads_after {
            Some(count) => documents.into_iter().take(count).map(Ok).collect(),
            None => documents.into_iter().map(Ok).collect(),
        };
        if inner.fail_reads_after.is_some() {
            items.push(Err(StoreError::Query(format!(
                "stream over {} interrupted",
                collection
            ))));
        }

        Ok(stream::iter(items).boxed())
    }

    async fn write_batch(&self, records: Vec<NewRecord>) -> BatchOutcome {
        let mut inner = self.store.lock();
        let total = records.len();
        inner.writes_attempted += total;

        if inner.reject_writes {
            return BatchOutcome::Rejected(StoreError::Write(
                "memory store rejected the batch".to_string(),
            ));
        }

        let mut failed = Vec::new();
        for (index, record) in records.into_iter().enumerate() {
            if inner.failing_writes.contains(&index) {
                failed.push(index);
                continue;
            }
            inner
                .collections
                .entry(record.collection)
                .or_default()
                .push(StoredDocument {
                    key: Uuid::new_v4().simple().to_string(),
                    data: record.data,
                });
        }

        BatchOutcome::from_failures(total, failed, None)
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        self.store.lock().sessions_closed += 1;
        Ok(())
    }
}
