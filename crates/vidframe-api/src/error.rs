//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Anything that
//! converts into `AppError` converts into `HttpAppError` and renders as an
//! [`ErrorResponse`] with the status code the error's metadata asks for.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;
use validator::Validate;
use vidframe_core::{AppError, ErrorMetadata, LogLevel};
use vidframe_processing::{ArchiveError, ValidationError};
use vidframe_queue::QueueError;
use vidframe_storage::StorageError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether retrying the same request may succeed
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorResponse {
    /// Render `error`. Details and the error type are only included when
    /// `hide_details` is false and the error is not sensitive.
    pub fn from_app_error(error: &AppError, hide_details: bool) -> Self {
        let show_details = !hide_details && !error.is_sensitive();
        Self {
            error: error.client_message(),
            details: show_details.then(|| error.detailed_message()),
            error_type: show_details.then(|| error.error_type().to_string()),
            code: error.error_code().to_string(),
            recoverable: error.is_recoverable(),
            suggested_action: error.suggested_action().map(String::from),
        }
    }
}

/// Wrapper so `IntoResponse` can be implemented for the core error type
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<ValidationError> for HttpAppError {
    fn from(err: ValidationError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<ArchiveError> for HttpAppError {
    fn from(err: ArchiveError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<QueueError> for HttpAppError {
    fn from(err: QueueError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::BadRequest(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body that is deserialized and then checked with `validator`; both
/// failures render as our 400 error body.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        inner.validate().map_err(AppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = ErrorResponse::from_app_error(app_error, is_production_env());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_requests() {
        let HttpAppError(err) = ValidationError::FileTooLarge {
            size: 1000,
            max: 500,
        }
        .into();
        assert_eq!(err.http_status_code(), 400);

        let HttpAppError(err) = ValidationError::InvalidExtension {
            extension: "txt".to_string(),
            allowed: vec!["mp4".to_string()],
        }
        .into();
        assert!(matches!(err, AppError::InvalidInput(ref msg) if msg.contains("txt")));
    }

    #[test]
    fn storage_not_found_is_404() {
        let HttpAppError(err) = StorageError::NotFound("uploads/x".to_string()).into();
        assert_eq!(err.http_status_code(), 404);
    }

    #[test]
    fn empty_prefix_is_no_content() {
        let HttpAppError(err) =
            ArchiveError::NoContent("processed/x/frames/".to_string()).into();
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NO_CONTENT");
        assert_eq!(
            err.client_message(),
            "no content found for prefix: processed/x/frames/"
        );
    }

    #[test]
    fn sensitive_errors_hide_details() {
        let err = AppError::Storage("bucket vidframe-prod: access denied".to_string());
        let body = ErrorResponse::from_app_error(&err, false);
        assert_eq!(body.error, "Failed to access storage");
        assert_eq!(body.code, "STORAGE_ERROR");
        assert!(body.recoverable);
        assert!(body.details.is_none());
        assert!(body.error_type.is_none());
    }

    #[test]
    fn production_hides_details() {
        let err = AppError::NotFound("Video not found".to_string());

        let dev = ErrorResponse::from_app_error(&err, false);
        assert_eq!(dev.error_type.as_deref(), Some("NotFound"));
        assert!(dev.details.is_some());

        let prod = ErrorResponse::from_app_error(&err, true);
        assert!(prod.details.is_none());
        assert!(prod.error_type.is_none());
        assert_eq!(prod.error, "Video not found");
    }

    #[test]
    fn error_response_shape() {
        let body = ErrorResponse::from_app_error(
            &AppError::NotReady("Video is not ready for download".to_string()),
            true,
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "VIDEO_NOT_READY");
        assert_eq!(json["recoverable"], true);
        assert!(json.get("details").is_none());
        assert!(json["suggested_action"].is_string());
    }
}
