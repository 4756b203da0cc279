use std::sync::Arc;
use std::time::Instant;

use crate::metrics;
use crate::models::question::{Question, QuestionRecord};
use crate::store::{release, within, CollectionRef, StoreConnector, StoreError, StoreSession};

use super::{decode_all, RepositoryOptions};

pub const QUESTIONS_COLLECTION: &str = "quiz-questions";

/// Read-only access to the question catalog.
#[derive(Clone)]
pub struct QuestionRepository {
    connector: Arc<dyn StoreConnector>,
    options: RepositoryOptions,
}

impl QuestionRepository {
    pub fn new(connector: Arc<dyn StoreConnector>, options: RepositoryOptions) -> Self {
        Self { connector, options }
    }

    /// Every question in the catalog, in store order.
    pub async fn list_questions(&self) -> Result<Vec<Question>, StoreError> {
        let started = Instant::now();
        let result = self.fetch_catalog().await;
        metrics::observe_store_operation("list", QUESTIONS_COLLECTION, started, &result);

        if let Ok(questions) = &result {
            tracing::debug!("Loaded {} questions", questions.len());
        }
        result
    }

    async fn fetch_catalog(&self) -> Result<Vec<Question>, StoreError> {
        let limit = self.options.operation_timeout;
        let session = within(limit, self.connector.connect()).await?;
        let result = within(limit, self.read_catalog(session.as_ref())).await;
        release(session).await;
        result
    }

    async fn read_catalog(&self, session: &dyn StoreSession) -> Result<Vec<Question>, StoreError> {
        let collection = CollectionRef::root(QUESTIONS_COLLECTION);
        let stream = session.documents(&collection).await?;
        let records = decode_all::<QuestionRecord>(
            stream,
            self.options.skip_invalid,
            QUESTIONS_COLLECTION,
        )
        .await?;

        Ok(records
            .into_iter()
            .map(|(key, record)| record.into_question(key))
            .collect())
    }
}
