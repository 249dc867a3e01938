//! Route table and middleware stack

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::header::CONTENT_LENGTH,
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

use crate::api_doc::ApiDoc;
use crate::auth::{auth_middleware, internal_key_middleware};
use crate::constants::{API_PREFIX, OPENAPI_JSON_PATH};
use crate::error::HttpAppError;
use crate::handlers::{health, internal_zip, video_download, video_get, video_upload};
use crate::state::AppState;
use vidframe_core::AppError;

fn video_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/videos/upload", post(video_upload::upload_video))
        .route("/videos", get(video_get::list_videos))
        .route("/videos/{id}/status", get(video_get::get_video_status))
        .route("/videos/{id}/download", get(video_download::download_video))
        .route_layer(from_fn_with_state(state.jwt.clone(), auth_middleware))
}

fn internal_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/internal/zip/create", post(internal_zip::create_zip))
        .route_layer(from_fn_with_state(
            state.internal_key.clone(),
            internal_key_middleware,
        ))
}

/// Answer a declared Content-Length over the limit with the JSON error body
/// instead of the bare 413 from `RequestBodyLimitLayer`. Bodies without a
/// length still hit the streaming limit and fail while the upload is read.
async fn reject_oversized_body(
    State(limit): State<usize>,
    request: Request,
    next: Next,
) -> Response {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    if let Some(length) = declared.filter(|length| *length > limit) {
        tracing::warn!(length, limit, "Rejecting oversized request body");
        return HttpAppError(AppError::InvalidInput(format!(
            "Request body too large: {} bytes (max: {} bytes)",
            length, limit
        )))
        .into_response();
    }

    next.run(request).await
}

pub fn setup_routes(state: Arc<AppState>) -> Router {
    let body_limit = state.body_limit();

    Router::new()
        .nest(API_PREFIX, video_routes(&state))
        .merge(internal_routes(&state))
        .route("/health", get(health::health_check))
        .route(OPENAPI_JSON_PATH, get(|| async { Json(ApiDoc::openapi()) }))
        .merge(RapiDoc::new(OPENAPI_JSON_PATH).path("/docs"))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(from_fn_with_state(body_limit, reject_oversized_body))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(vidframe_infra::request_id_middleware))
        .with_state(state)
}
