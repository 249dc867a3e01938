use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use vidframe_core::AppError;

use crate::error::HttpAppError;

pub const INTERNAL_KEY_HEADER: &str = "X-Internal-Key";

/// Shared key for internal routes. `None` leaves them open.
#[derive(Clone, Default)]
pub struct InternalKey(pub Option<Arc<str>>);

impl InternalKey {
    pub fn new(key: Option<&str>) -> Self {
        Self(key.map(Arc::from))
    }

    fn accepts(&self, presented: Option<&str>) -> bool {
        match (&self.0, presented) {
            (None, _) => true,
            (Some(expected), Some(presented)) => {
                expected.len() == presented.len()
                    && bool::from(expected.as_bytes().ct_eq(presented.as_bytes()))
            }
            (Some(_), None) => false,
        }
    }
}

pub async fn internal_key_middleware(
    State(key): State<InternalKey>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(INTERNAL_KEY_HEADER)
        .and_then(|h| h.to_str().ok());

    if !key.accepts(presented) {
        tracing::warn!("Rejected internal request with missing or wrong key");
        return HttpAppError(AppError::Unauthorized("Invalid internal key".to_string()))
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_key_is_open() {
        let key = InternalKey::new(None);
        assert!(key.accepts(None));
        assert!(key.accepts(Some("anything")));
    }

    #[test]
    fn configured_key_must_match() {
        let key = InternalKey::new(Some("s3cret"));
        assert!(key.accepts(Some("s3cret")));
        assert!(!key.accepts(Some("s3cre")));
        assert!(!key.accepts(Some("S3CRET")));
        assert!(!key.accepts(None));
    }
}
