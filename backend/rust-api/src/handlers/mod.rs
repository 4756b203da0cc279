use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::metrics;
use crate::state::AppState;
use crate::store::{release, within};

pub mod answers;
pub mod error;
pub mod questions;

pub use error::ApiError;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(1);

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status_code, status, store) =
        match within(HEALTH_CHECK_TIMEOUT, state.connector.connect()).await {
            Ok(session) => {
                release(session).await;
                (
                    StatusCode::OK,
                    "healthy",
                    json!({ "status": "healthy", "message": "Store session acquired" }),
                )
            }
            Err(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "degraded",
                json!({ "status": "unhealthy", "error": e.to_string() }),
            ),
        };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": { "store": store }
        })),
    )
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Protects /metrics with HTTP Basic Auth against `metrics.auth`. The
/// endpoint does not exist when no credentials are configured.
pub async fn metrics_auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = state
        .config
        .metrics_auth
        .as_deref()
        .ok_or(StatusCode::NOT_FOUND)?;

    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}
