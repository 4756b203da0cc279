//! Repositories over the document store.
//!
//! Each repository owns a shared [`StoreConnector`](crate::store::StoreConnector)
//! and opens one session per call, releasing it before returning.

use std::time::Duration;

use futures::TryStreamExt;
use mongodb::bson;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::metrics::DOCUMENTS_SKIPPED_TOTAL;
use crate::store::{DocumentStream, StoreError, StoredDocument};

pub mod answers;
pub mod questions;

pub use answers::AnswerRepository;
pub use questions::QuestionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Well-formed request, zero matching records.
    #[error("no records found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-repository read policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Skip documents that fail to decode instead of failing the listing.
    pub skip_invalid: bool,
    /// Deadline applied to each store call (connect, enumerate, write).
    pub operation_timeout: Duration,
}

impl RepositoryOptions {
    pub fn tolerant(operation_timeout: Duration) -> Self {
        Self {
            skip_invalid: true,
            operation_timeout,
        }
    }

    pub fn strict(operation_timeout: Duration) -> Self {
        Self {
            skip_invalid: false,
            operation_timeout,
        }
    }
}

/// Drains `stream`, decoding each document body as `T`.
///
/// Returns `(key, value)` pairs in stream order. A broken stream always
/// fails the whole read; decode failures are skipped only when
/// `skip_invalid` is set.
pub(crate) async fn decode_all<T: DeserializeOwned>(
    mut stream: DocumentStream,
    skip_invalid: bool,
    collection: &str,
) -> Result<Vec<(String, T)>, StoreError> {
    let mut decoded = Vec::new();

    while let Some(StoredDocument { key, data }) = stream.try_next().await? {
        match bson::from_document::<T>(data) {
            Ok(value) => decoded.push((key, value)),
            Err(e) if skip_invalid => {
                tracing::warn!(
                    "Skipping document {} in {}: failed to decode: {}",
                    key,
                    collection,
                    e
                );
                DOCUMENTS_SKIPPED_TOTAL
                    .with_label_values(&[collection])
                    .inc();
            }
            Err(e) => {
                return Err(StoreError::Decode {
                    key,
                    message: e.to_string(),
                })
            }
        }
    }

    Ok(decoded)
}
