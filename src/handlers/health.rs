use axum::extract::State;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::handlers::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{empty_success, success};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    timestamp: DateTime<Utc>,
    version: &'static str,
}

pub async fn health() -> Response {
    let payload = HealthPayload {
        status: "healthy",
        timestamp: Utc::now(),
        version: APP_VERSION,
    };

    success(payload, "Health check successful").into_response()
}

/// Readiness probe: the service is ready once the store answers.
pub async fn ready(State(state): State<AppState>) -> Result<Response, AppError> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;

    Ok(empty_success("Service is ready").into_response())
}
