use std::sync::Arc;
use std::time::Instant;

use mongodb::bson;

use crate::metrics::{self, ANSWERS_RECORDED_TOTAL};
use crate::models::answer::QuestionAnswer;
use crate::store::{
    release, within, BatchOutcome, CollectionRef, StoreConnector, StoreError, StoreSession,
};

use super::{decode_all, RepositoryError, RepositoryOptions};

pub const USER_ANSWERS_COLLECTION: &str = "userAnswers";
pub const ANSWERED_QUESTIONS_COLLECTION: &str = "answeredQuestions";

// Per-user paths would explode metric cardinality.
const METRICS_COLLECTION: &str = "userAnswers.answeredQuestions";

/// `userAnswers/{user_id}/answeredQuestions`
pub fn answers_collection(user_id: &str) -> CollectionRef {
    CollectionRef::root(USER_ANSWERS_COLLECTION)
        .subcollection(user_id, ANSWERED_QUESTIONS_COLLECTION)
}

/// Append-only answer history, partitioned per user.
#[derive(Clone)]
pub struct AnswerRepository {
    connector: Arc<dyn StoreConnector>,
    options: RepositoryOptions,
}

impl AnswerRepository {
    pub fn new(connector: Arc<dyn StoreConnector>, options: RepositoryOptions) -> Self {
        Self { connector, options }
    }

    /// Writes one record per answer as a single, non-atomic bulk batch.
    ///
    /// Callers must pass a non-empty `user_id` and at least one answer.
    /// `Err` means the batch was never submitted (encoding, connection or
    /// deadline failure); otherwise the outcome says which writes landed.
    pub async fn record_answers(
        &self,
        user_id: &str,
        answers: &[QuestionAnswer],
    ) -> Result<BatchOutcome, StoreError> {
        let started = Instant::now();
        let result = self.submit_batch(user_id, answers).await;

        let observed = match &result {
            Ok(outcome) => outcome.error().cloned().map_or(Ok(()), Err),
            Err(e) => Err(e.clone()),
        };
        metrics::observe_store_operation("record", METRICS_COLLECTION, started, &observed);

        if let Ok(outcome) = &result {
            for (index, answer) in answers.iter().enumerate() {
                if outcome.accepted(index) {
                    let label = if answer.answered_correctly { "true" } else { "false" };
                    ANSWERS_RECORDED_TOTAL.with_label_values(&[label]).inc();
                }
            }

            match outcome {
                BatchOutcome::AllAccepted { count } => {
                    tracing::info!("Recorded {} answers for user {}", count, user_id)
                }
                BatchOutcome::PartiallyAccepted {
                    accepted,
                    failed,
                    error,
                } => tracing::warn!(
                    "Recorded {} of {} answers for user {}, failed positions {:?}: {}",
                    accepted,
                    answers.len(),
                    user_id,
                    failed,
                    error
                ),
                BatchOutcome::Rejected(error) => {
                    tracing::error!("Answer batch for user {} rejected: {}", user_id, error)
                }
            }
        }

        result
    }

    async fn submit_batch(
        &self,
        user_id: &str,
        answers: &[QuestionAnswer],
    ) -> Result<BatchOutcome, StoreError> {
        let collection = answers_collection(user_id);
        let records = answers
            .iter()
            .map(|answer| {
                bson::to_document(answer)
                    .map(|data| collection.new_record(data))
                    .map_err(|e| StoreError::Write(format!("failed to encode answer: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let limit = self.options.operation_timeout;
        let session = within(limit, self.connector.connect()).await?;
        // On a deadline some writes may still have landed; report the batch
        // as rejected since nothing was confirmed.
        let outcome = tokio::time::timeout(limit, session.write_batch(records))
            .await
            .unwrap_or_else(|_| BatchOutcome::Rejected(StoreError::Timeout(limit)));
        release(session).await;

        Ok(outcome)
    }

    /// Full answer history for `user_id`, in store order.
    ///
    /// A user without any recorded answers is [`RepositoryError::NotFound`].
    pub async fn list_answers(&self, user_id: &str) -> Result<Vec<QuestionAnswer>, RepositoryError> {
        let started = Instant::now();
        let result = self.fetch_history(user_id).await;
        metrics::observe_store_operation("list", METRICS_COLLECTION, started, &result);

        let answers = result?;
        if answers.is_empty() {
            return Err(RepositoryError::NotFound);
        }
        Ok(answers)
    }

    async fn fetch_history(&self, user_id: &str) -> Result<Vec<QuestionAnswer>, StoreError> {
        let limit = self.options.operation_timeout;
        let session = within(limit, self.connector.connect()).await?;
        let result = within(limit, self.read_history(session.as_ref(), user_id)).await;
        release(session).await;
        result
    }

    async fn read_history(
        &self,
        session: &dyn StoreSession,
        user_id: &str,
    ) -> Result<Vec<QuestionAnswer>, StoreError> {
        let stream = session.documents(&answers_collection(user_id)).await?;
        let records =
            decode_all::<QuestionAnswer>(stream, self.options.skip_invalid, METRICS_COLLECTION)
                .await?;
        Ok(records.into_iter().map(|(_, answer)| answer).collect())
    }
}
