//! MongoDB-backed document store.
//!
//! Mongo has no sub-collections, so a nested [`CollectionRef`] maps to the
//! collection named by its joined collection segments
//! (`userAnswers.answeredQuestions`) and each document carries the path of its
//! parent in `_parent`. Store keys live in `_id`.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use futures::StreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    error::ErrorKind,
    options::{ClientOptions, Credential},
    Client, Database,
};
use serde::Deserialize;

use super::{
    BatchOutcome, CollectionRef, DocumentStream, NewRecord, StoreConnector, StoreError,
    StoreSession, StoredDocument,
};
use crate::config::StoreSettings;

pub const PARENT_FIELD: &str = "_parent";

/// Service-account credentials, supplied as base64-encoded JSON.
#[derive(Deserialize)]
pub struct StoreCredentials {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl StoreCredentials {
    pub fn from_base64(blob: &str) -> anyhow::Result<Self> {
        let raw = general_purpose::STANDARD
            .decode(blob.trim())
            .context("Store credentials are not valid base64")?;
        serde_json::from_slice(&raw).context("Store credentials are not a valid JSON object")
    }
}

impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Connector over a pooled `mongodb::Client`. Cloning shares the pool.
#[derive(Clone)]
pub struct MongoConnector {
    client: Client,
    database: String,
}

impl MongoConnector {
    pub async fn new(settings: &StoreSettings) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(&settings.uri)
            .await
            .context("Invalid store URI")?;

        if let Some(blob) = &settings.credentials_base64 {
            let credentials = StoreCredentials::from_base64(blob)?;
            let mut credential = Credential::default();
            credential.username = Some(credentials.username);
            credential.password = Some(credentials.password);
            credential.source = credentials.source;
            options.credential = Some(credential);
        }

        options
            .app_name
            .get_or_insert_with(|| env!("CARGO_PKG_NAME").to_string());
        options
            .server_selection_timeout
            .get_or_insert(settings.operation_timeout);

        let client = Client::with_options(options).context("Failed to build store client")?;
        Ok(Self::from_client(client, settings.database.clone()))
    }

    pub fn from_client(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }
}

#[async_trait]
impl StoreConnector for MongoConnector {
    async fn connect(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let db = self.client.database(&self.database);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(Box::new(MongoSession { db }))
    }
}

struct MongoSession {
    db: Database,
}

#[async_trait]
impl StoreSession for MongoSession {
    async fn documents(&self, collection: &CollectionRef) -> Result<DocumentStream, StoreError> {
        let cursor = self
            .db
            .collection::<Document>(&collection_name(collection))
            .find(parent_filter(collection))
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let stream = cursor.map(|item| {
            item.map_err(|e| StoreError::Query(e.to_string()))
                .and_then(split_document)
        });
        Ok(stream.boxed())
    }

    async fn write_batch(&self, records: Vec<NewRecord>) -> BatchOutcome {
        let total = records.len();

        let mut groups: BTreeMap<String, Vec<(usize, Document)>> = BTreeMap::new();
        for (index, record) in records.into_iter().enumerate() {
            let mut data = record.data;
            data.insert("_id", ObjectId::new());
            if let Some(parent) = record.collection.parent_path() {
                data.insert(PARENT_FIELD, parent);
            }
            groups
                .entry(collection_name(&record.collection))
                .or_default()
                .push((index, data));
        }

        let mut failed = Vec::new();
        let mut first_error = None;
        for (name, entries) in groups {
            let (indices, documents): (Vec<usize>, Vec<Document>) = entries.into_iter().unzip();

            if let Err(e) = self
                .db
                .collection::<Document>(&name)
                .insert_many(documents)
                .ordered(false)
                .await
            {
                let positions = failed_positions(&e, indices.len());
                tracing::warn!(
                    "Bulk insert into {} failed for {} of {} documents: {}",
                    name,
                    positions.len(),
                    indices.len(),
                    e
                );
                failed.extend(positions.into_iter().map(|position| indices[position]));
                first_error.get_or_insert_with(|| StoreError::Write(e.to_string()));
            }
        }

        BatchOutcome::from_failures(total, failed, first_error)
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        // Connections go back to the client's pool on drop.
        Ok(())
    }
}

fn collection_name(collection: &CollectionRef) -> String {
    collection.collection_names().collect::<Vec<_>>().join(".")
}

fn parent_filter(collection: &CollectionRef) -> Document {
    let mut filter = Document::new();
    if let Some(parent) = collection.parent_path() {
        filter.insert(PARENT_FIELD, parent);
    }
    filter
}

fn split_document(mut data: Document) -> Result<StoredDocument, StoreError> {
    let key = match data.remove("_id") {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(key)) => key,
        Some(other) => other.to_string(),
        None => return Err(StoreError::Query("document without _id".to_string())),
    };
    data.remove(PARENT_FIELD);
    Ok(StoredDocument { key, data })
}

/// Positions within one `insert_many` call that were not written.
fn failed_positions(error: &mongodb::error::Error, len: usize) -> Vec<usize> {
    match *error.kind {
        // Unordered inserts report per-document failures; a write concern
        // error leaves every document in the call unconfirmed.
        ErrorKind::InsertMany(ref failure) if failure.write_concern_error.is_none() => {
            positions_or_all(
                failure
                    .write_errors
                    .iter()
                    .flatten()
                    .map(|write_error| write_error.index),
                len,
            )
        }
        _ => (0..len).collect(),
    }
}

/// In-range reported positions, or every position when none are usable.
fn positions_or_all(reported: impl Iterator<Item = usize>, len: usize) -> Vec<usize> {
    let positions: Vec<usize> = reported.filter(|index| *index < len).collect();
    if positions.is_empty() {
        (0..len).collect()
    } else {
        positions
    }
}
