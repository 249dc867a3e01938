//! Test helpers: the gateway router over in-memory repositories, an
//! in-memory queue and local storage in a temp dir.
//!
//! Run with `cargo test -p vidframe-api`. The PostgreSQL-backed tests use
//! [`postgres::setup_test_database`].

#![allow(dead_code)]

pub mod postgres;

use axum_test::TestServer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::sync::Arc;
use tempfile::TempDir;
use vidframe_api::auth::{InternalKey, JwtValidator};
use vidframe_api::constants::API_PREFIX;
use vidframe_api::setup::routes;
use vidframe_api::AppState;
use vidframe_db::InMemoryVideoRepository;
use vidframe_processing::{ArchiveBuilder, UploadValidator};
use vidframe_queue::InMemoryQueue;
use vidframe_services::{AdmissionConfig, UploadAdmission, VideoCatalog};
use vidframe_storage::LocalStorage;

pub const JWT_SECRET: &str = "integration-test-secret-0123456789";
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

pub fn api_path(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

/// Bearer token for `user_id`, valid for an hour
pub fn token_for(user_id: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    encode(
        &Header::new(Algorithm::HS256),
        &serde_json::json!({ "sub": user_id, "iat": now, "exp": now + 3600 }),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}

pub fn bearer(user_id: i64) -> String {
    format!("Bearer {}", token_for(user_id))
}

pub struct TestApp {
    pub server: TestServer,
    pub videos: Arc<InMemoryVideoRepository>,
    pub storage: Arc<LocalStorage>,
    pub queue: Arc<InMemoryQueue>,
    pub _temp_dir: TempDir,
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with_internal_key(None).await
}

pub async fn setup_test_app_with_internal_key(internal_key: Option<&str>) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let storage = Arc::new(
        LocalStorage::new(temp_dir.path(), "http://localhost:8080/media".to_string())
            .await
            .expect("Failed to create local storage"),
    );
    let videos = Arc::new(InMemoryVideoRepository::new());
    let queue = Arc::new(InMemoryQueue::new());

    let validator = UploadValidator::new(
        MAX_UPLOAD_BYTES,
        ["mp4", "avi", "mov", "mkv", "webm"].map(String::from).to_vec(),
    );
    let admission = UploadAdmission::new(
        videos.clone(),
        storage.clone(),
        queue.clone(),
        validator,
        AdmissionConfig::default(),
        tracing::Span::none(),
    );

    let state = Arc::new(AppState {
        admission: Arc::new(admission),
        catalog: VideoCatalog::new(videos.clone(), storage.clone()),
        archives: ArchiveBuilder::new(storage.clone()),
        jwt: Arc::new(JwtValidator::new(JWT_SECRET)),
        internal_key: InternalKey::new(internal_key),
        pool: None,
    });

    let server = TestServer::new(routes::setup_routes(state).into_make_service())
        .expect("Failed to create test server");

    TestApp {
        server,
        videos,
        storage,
        queue,
        _temp_dir: temp_dir,
    }
}
