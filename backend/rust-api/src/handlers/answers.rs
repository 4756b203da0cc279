use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::error::ApiError;
use crate::{
    extractors::{AppJson, AppQuery},
    models::{answer::UserAnswersQuery, QuestionAnswer, UserAnswer},
    repositories::RepositoryError,
    state::AppState,
    store::BatchOutcome,
};

pub const ANSWERS_RECORDED_MESSAGE: &str = "Answers recorded successfully";

/// POST /api/user/answers - record a batch of answer outcomes for a user
pub async fn submit_answers(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<UserAnswer>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.validate().is_err() {
        return Err(ApiError::Validation("Missing required fields".to_string()));
    }

    tracing::info!(
        "Submitting {} answers for user_id={}",
        payload.answered_questions.len(),
        payload.user_id
    );

    // Partial acceptance is reported as a failure; accepted writes stay.
    state
        .answers
        .record_answers(&payload.user_id, &payload.answered_questions)
        .await
        .and_then(BatchOutcome::into_result)
        .map_err(|e| {
            tracing::error!("Failed to record answers: {}", e);
            ApiError::Internal(format!("Error writing to store: {}", e))
        })?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": ANSWERS_RECORDED_MESSAGE })),
    ))
}

/// GET /api/user/answers?userId=... - a user's recorded answers
pub async fn list_user_answers(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<UserAnswersQuery>,
) -> Result<Json<Vec<QuestionAnswer>>, ApiError> {
    let user_id = query
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing userId".to_string()))?;

    tracing::info!("Listing answers for user_id={}", user_id);

    match state.answers.list_answers(&user_id).await {
        Ok(answers) => Ok(Json(answers)),
        Err(RepositoryError::NotFound) => Err(ApiError::NotFound(
            "No answers found for user".to_string(),
        )),
        Err(RepositoryError::Store(e)) => {
            tracing::error!("Failed to list answers for {}: {}", user_id, e);
            Err(ApiError::Internal(e.to_string()))
        }
    }
}
