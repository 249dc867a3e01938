use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use vidframe_core::models::DownloadResponse;

use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}/download",
    tag = "videos",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Time-limited archive download URL", body = DownloadResponse),
        (status = 403, description = "Video belongs to another user", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse),
        (status = 409, description = "Processing has not completed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = user.user_id, video_id = %id, operation = "download_video"))]
pub async fn download_video(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadResponse>, HttpAppError> {
    let download = state.catalog.download(user.user_id, id).await?;
    Ok(Json(download))
}
