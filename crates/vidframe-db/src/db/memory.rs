//! In-process repository implementations
//!
//! They apply the same conditional status rules as the SQL versions and can be
//! switched into an "unavailable" mode to exercise persistence failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;
use vidframe_core::{
    AppError, NewNotification, Notification, NotificationStatus, Video, VideoStatus,
};

use super::notification::NotificationRepository;
use super::user::UserDirectory;
use super::video::{can_claim, ClaimOutcome, VideoRepository};

fn unavailable_error() -> AppError {
    AppError::Database(sqlx::Error::PoolTimedOut)
}

#[derive(Default)]
pub struct InMemoryVideoRepository {
    videos: RwLock<HashMap<Uuid, Video>>,
    unavailable: AtomicBool,
}

impl InMemoryVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a database error until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Replace a stored row directly (test setup)
    pub async fn put(&self, video: Video) {
        self.videos.write().await.insert(video.id, video);
    }

    pub async fn len(&self) -> usize {
        self.videos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.videos.read().await.is_empty()
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable_error());
        }
        Ok(())
    }
}

#[async_trait]
impl VideoRepository for InMemoryVideoRepository {
    async fn create(&self, video: &Video) -> Result<(), AppError> {
        self.check()?;
        let mut videos = self.videos.write().await;
        if videos.contains_key(&video.id) {
            return Err(AppError::Internal(format!("duplicate video id {}", video.id)));
        }
        videos.insert(video.id, video.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        self.check()?;
        Ok(self.videos.read().await.get(&id).cloned())
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Video>, AppError> {
        self.check()?;
        let mut owned: Vec<Video> = self
            .videos
            .read()
            .await
            .values()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_user(&self, user_id: i64) -> Result<i64, AppError> {
        self.check()?;
        Ok(self
            .videos
            .read()
            .await
            .values()
            .filter(|v| v.user_id == user_id)
            .count() as i64)
    }

    async fn claim_for_processing(
        &self,
        id: Uuid,
        lease: Duration,
    ) -> Result<ClaimOutcome, AppError> {
        self.check()?;
        let mut videos = self.videos.write().await;
        let Some(video) = videos.get_mut(&id) else {
            return Ok(ClaimOutcome::Missing);
        };
        let now = Utc::now();
        if can_claim(video, lease, now) {
            video.status = VideoStatus::Processing;
            video.started_at = Some(now);
            return Ok(ClaimOutcome::Claimed(video.clone()));
        }
        if video.status.is_terminal() {
            Ok(ClaimOutcome::Finished(video.clone()))
        } else {
            Ok(ClaimOutcome::InProgress(video.clone()))
        }
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        frame_count: i32,
        archive_key: &str,
    ) -> Result<bool, AppError> {
        self.check()?;
        let mut videos = self.videos.write().await;
        match videos.get_mut(&id) {
            Some(video) if video.status == VideoStatus::Processing => {
                video.status = VideoStatus::Completed;
                video.frame_count = Some(frame_count);
                video.archive_key = Some(archive_key.to_string());
                video.error_message = None;
                video.completed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<bool, AppError> {
        self.check()?;
        let mut videos = self.videos.write().await;
        match videos.get_mut(&id) {
            Some(video) if video.status == VideoStatus::Processing => {
                video.status = VideoStatus::Failed;
                video.error_message = Some(error_message.to_string());
                video.frame_count = None;
                video.archive_key = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Video>, AppError> {
        self.check()?;
        let mut expired: Vec<Video> = self
            .videos
            .read()
            .await
            .values()
            .filter(|v| v.expires_at <= now)
            .cloned()
            .collect();
        expired.sort_by_key(|v| v.expires_at);
        Ok(expired)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.check()?;
        Ok(self.videos.write().await.remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    records: RwLock<Vec<Notification>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn all(&self) -> Vec<Notification> {
        self.records.read().await.clone()
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable_error());
        }
        Ok(())
    }

    async fn transition(
        &self,
        id: i64,
        apply: impl FnOnce(&mut Notification),
    ) -> Result<bool, AppError> {
        self.check()?;
        let mut records = self.records.write().await;
        match records.iter_mut().find(|n| n.id == id) {
            Some(record) if record.status == NotificationStatus::Pending => {
                apply(record);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn create(&self, new: NewNotification) -> Result<Notification, AppError> {
        self.check()?;
        let record = Notification {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: new.user_id,
            video_id: new.video_id,
            channel: new.channel,
            status: NotificationStatus::Pending,
            recipient: new.recipient,
            subject: new.subject,
            error_message: None,
            sent_at: None,
            created_at: Utc::now(),
        };
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn mark_sent(&self, id: i64) -> Result<bool, AppError> {
        self.transition(id, |record| {
            record.status = NotificationStatus::Sent;
            record.sent_at = Some(Utc::now());
        })
        .await
    }

    async fn mark_failed(&self, id: i64, error_message: &str) -> Result<bool, AppError> {
        let message = error_message.to_string();
        self.transition(id, move |record| {
            record.status = NotificationStatus::Failed;
            record.error_message = Some(message);
        })
        .await
    }

    async fn list_by_video(&self, video_id: Uuid) -> Result<Vec<Notification>, AppError> {
        self.check()?;
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|n| n.video_id == Some(video_id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    emails: RwLock<HashMap<i64, String>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user_id: i64, email: impl Into<String>) {
        self.emails.write().await.insert(user_id, email.into());
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn email_for(&self, user_id: i64) -> Result<Option<String>, AppError> {
        Ok(self.emails.read().await.get(&user_id).cloned())
    }
}
