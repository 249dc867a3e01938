use axum::{
    extract::{Multipart, State},
    http::{header::CONTENT_LENGTH, StatusCode},
    Json,
};
use std::sync::Arc;
use vidframe_core::constants::UPLOAD_FIELD_NAME;
use vidframe_core::models::UploadVideoResponse;
use vidframe_core::AppError;

use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Buffered upload: filename, client-declared size and the bytes
struct UploadedFile {
    filename: String,
    declared_size: usize,
    data: bytes::Bytes,
}

async fn read_video_field(multipart: &mut Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e.body_text())))?
    {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput("Missing filename".to_string()))?;
        let declared_size = field
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let data = field.bytes().await.map_err(|e| {
            AppError::BadRequest(format!("Failed to read upload: {}", e.body_text()))
        })?;

        return Ok(UploadedFile {
            filename,
            declared_size,
            data,
        });
    }

    Err(AppError::InvalidInput(format!(
        "Missing '{}' field",
        UPLOAD_FIELD_NAME
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/videos/upload",
    tag = "videos",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Video accepted for processing", body = UploadVideoResponse),
        (status = 400, description = "Invalid upload", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(user_id = user.user_id, operation = "upload_video"))]
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadVideoResponse>), HttpAppError> {
    let upload = read_video_field(&mut multipart).await?;

    let response = state
        .admission
        .admit(
            user.user_id,
            &upload.filename,
            upload.declared_size,
            upload.data,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}
