use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;
use vidframe_core::models::{VideoListResponse, VideoStatusResponse};

use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Page size, 1 to 100 (default 20)
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/videos",
    tag = "videos",
    params(ListQuery),
    responses(
        (status = 200, description = "The caller's videos, newest first", body = VideoListResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = user.user_id, operation = "list_videos"))]
pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<VideoListResponse>, HttpAppError> {
    let page = state
        .catalog
        .list(user.user_id, query.limit, query.offset)
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}/status",
    tag = "videos",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Processing status", body = VideoStatusResponse),
        (status = 403, description = "Video belongs to another user", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = user.user_id, video_id = %id, operation = "get_video_status"))]
pub async fn get_video_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<VideoStatusResponse>, HttpAppError> {
    let status = state.catalog.status(user.user_id, id).await?;
    Ok(Json(status))
}
