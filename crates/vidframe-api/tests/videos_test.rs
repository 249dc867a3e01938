mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::{api_path, bearer, setup_test_app, TestApp, MAX_UPLOAD_BYTES};
use vidframe_api::constants::MULTIPART_OVERHEAD_BYTES;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use vidframe_core::constants::{NOTIFICATION_QUEUE, PROCESSING_QUEUE};
use vidframe_core::models::{
    DownloadResponse, UploadVideoResponse, VideoListResponse, VideoStatusResponse,
};
use vidframe_core::{ProcessingJob, VideoStatus};
use vidframe_db::{
    InMemoryNotificationRepository, InMemoryUserDirectory, VideoRepository,
};
use vidframe_processing::{FrameExtractionWorker, ScriptedFrameExtractor, WorkerConfig};
use vidframe_queue::{ConsumerConfig, MessageQueue, QueueConsumer, Settlement};
use vidframe_services::{CompletionNotifier, RecordingMailer};
use vidframe_storage::Storage;

fn video_form(filename: &str, data: &'static [u8]) -> MultipartForm {
    let part = Part::bytes(bytes::Bytes::from_static(data))
        .file_name(filename.to_string())
        .mime_type("video/mp4");
    MultipartForm::new().add_part("video", part)
}

async fn upload(app: &TestApp, user_id: i64, filename: &str) -> UploadVideoResponse {
    let response = app
        .server
        .post(&api_path("/videos/upload"))
        .add_header("Authorization", bearer(user_id))
        .multipart(video_form(filename, b"not really a video"))
        .await;
    assert_eq!(response.status_code(), 201);
    response.json::<UploadVideoResponse>()
}

#[tokio::test]
async fn upload_creates_pending_video_and_job() {
    let app = setup_test_app().await;

    let uploaded = upload(&app, 7, "clip.mp4").await;
    assert_eq!(uploaded.filename, "clip.mp4");
    assert_eq!(uploaded.status, VideoStatus::Pending);

    let video = app.videos.get(uploaded.video_id).await.unwrap().unwrap();
    assert_eq!(video.user_id, 7);
    assert_eq!(video.status, VideoStatus::Pending);
    assert!(app.storage.exists(&video.source_key).await.unwrap());

    let jobs = app.queue.pending(PROCESSING_QUEUE).await;
    assert_eq!(jobs.len(), 1);
    let job: ProcessingJob = serde_json::from_str(&jobs[0]).unwrap();
    assert_eq!(job.video_id, uploaded.video_id);
    assert_eq!(job.filename, "clip.mp4");
}

#[tokio::test]
async fn upload_accepts_double_dot_inside_filename() {
    let app = setup_test_app().await;

    let uploaded = upload(&app, 7, "my..clip.mp4").await;
    assert_eq!(uploaded.filename, "my..clip.mp4");

    let video = app.videos.get(uploaded.video_id).await.unwrap().unwrap();
    assert!(video.source_key.ends_with("/my..clip.mp4"));
    assert!(app.storage.exists(&video.source_key).await.unwrap());
}

#[tokio::test]
async fn upload_requires_authentication() {
    let app = setup_test_app().await;

    let response = app
        .server
        .post(&api_path("/videos/upload"))
        .multipart(video_form("clip.mp4", b"data"))
        .await;
    assert_eq!(response.status_code(), 401);

    let response = app
        .server
        .post(&api_path("/videos/upload"))
        .add_header("Authorization", "Bearer not-a-token")
        .multipart(video_form("clip.mp4", b"data"))
        .await;
    assert_eq!(response.status_code(), 401);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");

    assert!(app.videos.is_empty().await);
}

#[tokio::test]
async fn rejected_upload_leaves_nothing_behind() {
    let app = setup_test_app().await;

    let response = app
        .server
        .post(&api_path("/videos/upload"))
        .add_header("Authorization", bearer(7))
        .multipart(video_form("notes.txt", b"hello"))
        .await;
    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");

    let response = app
        .server
        .post(&api_path("/videos/upload"))
        .add_header("Authorization", bearer(7))
        .multipart(MultipartForm::new().add_text("title", "no file here"))
        .await;
    assert_eq!(response.status_code(), 400);

    assert!(app.videos.is_empty().await);
    assert!(app.queue.pending(PROCESSING_QUEUE).await.is_empty());
    assert!(app.storage.list("uploads/").await.unwrap().is_empty());
}

#[tokio::test]
async fn oversized_body_is_rejected_as_json() {
    let app = setup_test_app().await;
    let limit = MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES;
    let body = vec![0u8; limit + 1];

    let response = app
        .server
        .post(&api_path("/videos/upload"))
        .add_header("Authorization", bearer(7))
        .add_header("Content-Type", "multipart/form-data; boundary=vidframe")
        .add_header("Content-Length", body.len().to_string())
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
    assert_eq!(body["recoverable"], false);

    assert!(app.videos.is_empty().await);
    assert!(app.queue.pending(PROCESSING_QUEUE).await.is_empty());
}

#[tokio::test]
async fn list_is_scoped_and_paginated() {
    let app = setup_test_app().await;
    for n in 0..5 {
        upload(&app, 7, &format!("clip{}.mp4", n)).await;
    }
    upload(&app, 8, "other.mp4").await;

    let response = app
        .server
        .get(&api_path("/videos?limit=2&offset=2"))
        .add_header("Authorization", bearer(7))
        .await;
    assert_eq!(response.status_code(), 200);
    let page: VideoListResponse = response.json();
    assert_eq!(page.total, 5);
    assert_eq!(page.limit, 2);
    assert_eq!(page.offset, 2);
    assert_eq!(page.videos.len(), 2);
    assert!(page.has_more);

    let response = app
        .server
        .get(&api_path("/videos?limit=500"))
        .add_header("Authorization", bearer(8))
        .await;
    let page: VideoListResponse = response.json();
    assert_eq!(page.total, 1);
    assert_eq!(page.limit, 20);
    assert!(!page.has_more);
}

#[tokio::test]
async fn status_distinguishes_forbidden_from_missing() {
    let app = setup_test_app().await;
    let uploaded = upload(&app, 7, "clip.mp4").await;

    let response = app
        .server
        .get(&api_path(&format!("/videos/{}/status", uploaded.video_id)))
        .add_header("Authorization", bearer(7))
        .await;
    assert_eq!(response.status_code(), 200);
    let status: VideoStatusResponse = response.json();
    assert_eq!(status.status, VideoStatus::Pending);
    assert!(status.frame_count.is_none());

    let response = app
        .server
        .get(&api_path(&format!("/videos/{}/status", uploaded.video_id)))
        .add_header("Authorization", bearer(8))
        .await;
    assert_eq!(response.status_code(), 403);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "ACCESS_DENIED");

    let response = app
        .server
        .get(&api_path(&format!("/videos/{}/status", Uuid::new_v4())))
        .add_header("Authorization", bearer(7))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn download_before_completion_is_conflict() {
    let app = setup_test_app().await;
    let uploaded = upload(&app, 7, "clip.mp4").await;

    let response = app
        .server
        .get(&api_path(&format!("/videos/{}/download", uploaded.video_id)))
        .add_header("Authorization", bearer(7))
        .await;
    assert_eq!(response.status_code(), 409);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VIDEO_NOT_READY");
    assert_eq!(body["recoverable"], true);
}

#[tokio::test]
async fn upload_process_notify_download() {
    let app = setup_test_app().await;
    let uploaded = upload(&app, 7, "clip.mp4").await;

    // Frame worker picks up the job
    let worker = FrameExtractionWorker::new(
        app.videos.clone(),
        app.storage.clone(),
        app.queue.clone(),
        Arc::new(ScriptedFrameExtractor::producing(42)),
        WorkerConfig::default(),
        tracing::Span::none(),
    );
    let consumer = QueueConsumer::new(
        app.queue.clone(),
        Arc::new(worker),
        ConsumerConfig::new(PROCESSING_QUEUE),
        tracing::Span::none(),
    );
    let delivery = app
        .queue
        .receive(PROCESSING_QUEUE, Duration::from_millis(10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(consumer.process(&delivery).await, Some(Settlement::Acked));

    let video = app.videos.get(uploaded.video_id).await.unwrap().unwrap();
    assert_eq!(video.status, VideoStatus::Completed);
    assert_eq!(video.frame_count, Some(42));
    assert!(video.error_message.is_none());

    // Notifier emails the owner
    let users = Arc::new(InMemoryUserDirectory::new());
    users.add_user(7, "user7@example.com").await;
    let mailer = Arc::new(RecordingMailer::new());
    let notifier = CompletionNotifier::new(
        app.videos.clone(),
        Arc::new(InMemoryNotificationRepository::new()),
        users,
        mailer.clone(),
        tracing::Span::none(),
    );
    let consumer = QueueConsumer::new(
        app.queue.clone(),
        Arc::new(notifier),
        ConsumerConfig::new(NOTIFICATION_QUEUE),
        tracing::Span::none(),
    );
    let event = app
        .queue
        .receive(NOTIFICATION_QUEUE, Duration::from_millis(10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(consumer.process(&event).await, Some(Settlement::Acked));

    let sent = mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "user7@example.com");
    assert!(sent[0].body.contains("Frames extracted: 42"));

    // The archive is now downloadable
    let response = app
        .server
        .get(&api_path(&format!("/videos/{}/download", uploaded.video_id)))
        .add_header("Authorization", bearer(7))
        .await;
    assert_eq!(response.status_code(), 200);
    let download: DownloadResponse = response.json();
    assert_eq!(download.expires_in, 900);
    assert_eq!(download.filename, "clip.mp4.zip");

    let response = app
        .server
        .get(&api_path(&format!("/videos/{}/status", uploaded.video_id)))
        .add_header("Authorization", bearer(7))
        .await;
    let status: VideoStatusResponse = response.json();
    assert_eq!(status.status, VideoStatus::Completed);
    assert_eq!(status.frame_count, Some(42));
    assert!(status.completed_at.is_some());
}
