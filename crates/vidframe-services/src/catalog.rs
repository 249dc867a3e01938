//! Read side of the gateway: status, listing and archive downloads

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use vidframe_core::constants::{DEFAULT_LIST_LIMIT, DOWNLOAD_URL_EXPIRY_SECS, MAX_LIST_LIMIT};
use vidframe_core::models::{DownloadResponse, VideoListItem, VideoListResponse, VideoStatusResponse};
use vidframe_core::{AppError, Video};
use vidframe_db::VideoRepository;
use vidframe_storage::Storage;

/// Clamp client paging parameters: limit outside `1..=100` falls back to the
/// default, a negative offset becomes zero.
pub fn normalize_paging(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = match limit {
        Some(l) if l > 0 && l <= MAX_LIST_LIMIT => l,
        _ => DEFAULT_LIST_LIMIT,
    };
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

#[derive(Clone)]
pub struct VideoCatalog {
    videos: Arc<dyn VideoRepository>,
    storage: Arc<dyn Storage>,
}

impl VideoCatalog {
    pub fn new(videos: Arc<dyn VideoRepository>, storage: Arc<dyn Storage>) -> Self {
        Self { videos, storage }
    }

    /// Fetch a video on behalf of `user_id`. Someone else's video is
    /// AccessDenied, never NotFound.
    async fn owned_video(&self, user_id: i64, video_id: Uuid) -> Result<Video, AppError> {
        let video = self
            .videos
            .get(video_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video not found: {}", video_id)))?;

        if !video.is_owned_by(user_id) {
            tracing::warn!(video_id = %video_id, user_id, "Access to another user's video denied");
            return Err(AppError::AccessDenied(format!(
                "Access denied to video: {}",
                video_id
            )));
        }

        Ok(video)
    }

    #[tracing::instrument(skip(self))]
    pub async fn status(&self, user_id: i64, video_id: Uuid) -> Result<VideoStatusResponse, AppError> {
        Ok(self.owned_video(user_id, video_id).await?.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        user_id: i64,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<VideoListResponse, AppError> {
        let (limit, offset) = normalize_paging(limit, offset);
        let videos = self.videos.list_by_user(user_id, limit, offset).await?;
        let total = self.videos.count_by_user(user_id).await?;

        Ok(VideoListResponse {
            videos: videos.into_iter().map(VideoListItem::from).collect(),
            total,
            limit,
            offset,
            has_more: offset + limit < total,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn download(&self, user_id: i64, video_id: Uuid) -> Result<DownloadResponse, AppError> {
        let video = self.owned_video(user_id, video_id).await?;

        let archive_key = match (&video.archive_key, video.is_downloadable()) {
            (Some(key), true) => key.clone(),
            _ => {
                return Err(AppError::NotReady(format!(
                    "Video is not ready for download (status: {})",
                    video.status
                )))
            }
        };

        let download_url = self
            .storage
            .presigned_get_url(&archive_key, Duration::from_secs(DOWNLOAD_URL_EXPIRY_SECS))
            .await?;

        Ok(DownloadResponse {
            download_url,
            filename: video.archive_filename(),
            expires_in: DOWNLOAD_URL_EXPIRY_SECS,
        })
    }
}
