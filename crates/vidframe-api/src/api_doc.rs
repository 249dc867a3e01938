//! OpenAPI document, served at [`crate::constants::OPENAPI_JSON_PATH`]

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use vidframe_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "vidframe API",
        version = "0.1.0",
        description = "Upload videos, follow frame extraction and download the extracted frames as a zip archive. User routes live under /api/v1 and take an HS256 bearer token."
    ),
    paths(
        handlers::video_upload::upload_video,
        handlers::video_get::list_videos,
        handlers::video_get::get_video_status,
        handlers::video_download::download_video,
        handlers::internal_zip::create_zip,
        handlers::health::health_check,
    ),
    components(schemas(
        models::UploadVideoResponse,
        models::VideoStatusResponse,
        models::VideoListItem,
        models::VideoListResponse,
        models::DownloadResponse,
        models::VideoStatus,
        handlers::internal_zip::ZipCreateRequest,
        handlers::internal_zip::ZipCreateResponse,
        handlers::health::HealthResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "videos", description = "Upload, status, listing and archive download"),
        (name = "internal", description = "Service-to-service routes"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/videos/upload",
            "/api/v1/videos",
            "/api/v1/videos/{id}/status",
            "/api/v1/videos/{id}/download",
            "/internal/zip/create",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
