use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;
use vidframe_core::AppError;
use vidframe_processing::ArchiveResult;

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ZipCreateRequest {
    pub video_id: String,
    /// Every object under this prefix goes into the archive
    #[validate(length(min = 1, max = 1024))]
    pub s3_prefix: String,
    #[validate(length(min = 1, max = 1024))]
    pub output_key: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ZipCreateResponse {
    pub zip_path: String,
    pub file_count: usize,
    pub zip_size_bytes: u64,
}

impl From<ArchiveResult> for ZipCreateResponse {
    fn from(result: ArchiveResult) -> Self {
        Self {
            zip_path: result.zip_path,
            file_count: result.file_count,
            zip_size_bytes: result.zip_size_bytes,
        }
    }
}

#[utoipa::path(
    post,
    path = "/internal/zip/create",
    tag = "internal",
    request_body = ZipCreateRequest,
    responses(
        (status = 200, description = "Archive uploaded", body = ZipCreateResponse),
        (status = 400, description = "Invalid request body", body = ErrorResponse),
        (status = 401, description = "Missing or wrong internal key", body = ErrorResponse),
        (status = 404, description = "Nothing stored under the prefix", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(video_id = %request.video_id, prefix = %request.s3_prefix))]
pub async fn create_zip(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ZipCreateRequest>,
) -> Result<Json<ZipCreateResponse>, HttpAppError> {
    if request.s3_prefix.trim().is_empty() || request.output_key.trim().is_empty() {
        return Err(AppError::BadRequest(
            "s3_prefix and output_key must not be empty".to_string(),
        )
        .into());
    }

    let result = state
        .archives
        .build(&request.s3_prefix, &request.output_key)
        .await?;

    tracing::info!(
        zip_path = %result.zip_path,
        file_count = result.file_count,
        zip_size_bytes = result.zip_size_bytes,
        "Archive created"
    );

    Ok(Json(result.into()))
}
