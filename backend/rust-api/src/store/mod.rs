//! Document store client.
//!
//! Repositories only talk to the store through [`StoreConnector`] and
//! [`StoreSession`]. A connector hands out one session per operation; the
//! caller closes it when done, on every exit path. Two implementations ship
//! with the crate: [`mongo::MongoConnector`] for production and
//! [`memory::MemoryStore`] for local runs and tests.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use mongodb::bson::Document;

pub mod error;
pub mod memory;
pub mod mongo;

pub use error::StoreError;

use crate::config::{StoreBackend, StoreSettings};

/// Address of a collection, possibly nested under a parent document.
///
/// Segments alternate between collection names and document keys and always
/// end with a collection name: `["userAnswers", "u1", "answeredQuestions"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    segments: Vec<String>,
}

impl CollectionRef {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Collection `name` scoped under the document `parent_key` of `self`.
    pub fn subcollection(&self, parent_key: impl Into<String>, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(parent_key.into());
        segments.push(name.into());
        Self { segments }
    }

    /// Write intent for a new document with a store-generated key.
    pub fn new_record(&self, data: Document) -> NewRecord {
        NewRecord {
            collection: self.clone(),
            data,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Collection names only, without the parent keys in between.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().step_by(2).map(String::as_str)
    }

    /// Path of the parent document, `None` for a top-level collection.
    pub fn parent_path(&self) -> Option<String> {
        if self.segments.len() < 3 {
            return None;
        }
        Some(self.segments[..self.segments.len() - 1].join("/"))
    }

    pub fn path(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A document as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Store-assigned key, unique within its collection.
    pub key: String,
    /// Document body without any store bookkeeping fields.
    pub data: Document,
}

/// One pending insert; the store assigns the key on acceptance.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub collection: CollectionRef,
    pub data: Document,
}

/// Result of a bulk write. Batches are not atomic: writes that were accepted
/// before or alongside a failure stay written.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    AllAccepted {
        count: usize,
    },
    PartiallyAccepted {
        accepted: usize,
        /// Positions in the submitted batch that were not written.
        failed: Vec<usize>,
        error: StoreError,
    },
    Rejected(StoreError),
}

impl BatchOutcome {
    /// Classifies a batch of `total` writes from the indices that failed.
    pub fn from_failures(total: usize, mut failed: Vec<usize>, error: Option<StoreError>) -> Self {
        failed.sort_unstable();
        failed.dedup();

        if failed.is_empty() {
            return BatchOutcome::AllAccepted { count: total };
        }

        let error = error.unwrap_or_else(|| {
            StoreError::Write(format!("{} of {} writes failed", failed.len(), total))
        });

        if failed.len() >= total {
            BatchOutcome::Rejected(error)
        } else {
            BatchOutcome::PartiallyAccepted {
                accepted: total - failed.len(),
                failed,
                error,
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, BatchOutcome::AllAccepted { .. })
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            BatchOutcome::AllAccepted { .. } => None,
            BatchOutcome::PartiallyAccepted { error, .. } | BatchOutcome::Rejected(error) => {
                Some(error)
            }
        }
    }

    /// Whether the write at `index` is known to have been accepted.
    pub fn accepted(&self, index: usize) -> bool {
        match self {
            BatchOutcome::AllAccepted { .. } => true,
            BatchOutcome::PartiallyAccepted { failed, .. } => failed.binary_search(&index).is_err(),
            BatchOutcome::Rejected(_) => false,
        }
    }

    /// Collapses the outcome for callers that treat any failed write as a
    /// failure of the whole batch.
    pub fn into_result(self) -> Result<usize, StoreError> {
        match self {
            BatchOutcome::AllAccepted { count } => Ok(count),
            BatchOutcome::PartiallyAccepted { error, .. } | BatchOutcome::Rejected(error) => {
                Err(error)
            }
        }
    }
}

/// Lazy, finite, non-restartable enumeration. `None` means exhausted; an
/// `Err` item means the stream broke and no further items should be read.
pub type DocumentStream = BoxStream<'static, Result<StoredDocument, StoreError>>;

/// Hands out store sessions. Implementations must be safe to call from many
/// requests at once; every call returns an independent session.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StoreSession>, StoreError>;
}

#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Enumerates every document of `collection` in store order.
    async fn documents(&self, collection: &CollectionRef) -> Result<DocumentStream, StoreError>;

    /// Submits all records as one bulk batch.
    async fn write_batch(&self, records: Vec<NewRecord>) -> BatchOutcome;

    /// Releases the session.
    async fn close(self: Box<Self>) -> Result<(), StoreError>;
}

/// Runs a store operation under a deadline.
pub async fn within<T, F>(limit: Duration, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

/// Builds the connector selected by `settings.backend`.
pub async fn build_connector(settings: &StoreSettings) -> anyhow::Result<Arc<dyn StoreConnector>> {
    match settings.backend {
        StoreBackend::Mongo => {
            let connector = mongo::MongoConnector::new(settings).await?;
            tracing::info!("Using MongoDB store, database {}", settings.database);
            Ok(Arc::new(connector))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(memory::MemoryStore::new()))
        }
    }
}

/// Closes a session, logging rather than propagating a failed release.
pub async fn release(session: Box<dyn StoreSession>) {
    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close store session: {}", e);
    }
}
