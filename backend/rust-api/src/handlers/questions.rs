use axum::{extract::State, Json};
use std::sync::Arc;

use super::error::ApiError;
use crate::{models::Question, state::AppState};

/// GET /api/questions - the full question catalog
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Question>>, ApiError> {
    match state.questions.list_questions().await {
        Ok(questions) => Ok(Json(questions)),
        Err(e) => {
            tracing::error!("Failed to list questions: {}", e);
            Err(ApiError::Internal(e.to_string()))
        }
    }
}
