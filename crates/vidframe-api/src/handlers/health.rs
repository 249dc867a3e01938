use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::state::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let database = match &state.pool {
        Some(pool) => {
            match tokio::time::timeout(CHECK_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await
            {
                Ok(Ok(_)) => "healthy".to_string(),
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Database health check failed");
                    format!("unhealthy: {}", e)
                }
                Err(_) => {
                    tracing::error!("Database health check timed out");
                    "timeout".to_string()
                }
            }
        }
        None => "in_memory".to_string(),
    };

    let healthy = database == "healthy" || database == "in_memory";
    let (code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            database,
        }),
    )
}
