use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of an uploaded video.
///
/// Transitions only move forward: `Pending -> Processing -> Completed | Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "video_status", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "PENDING",
            VideoStatus::Processing => "PROCESSING",
            VideoStatus::Completed => "COMPLETED",
            VideoStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }
}

impl Display for VideoStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(VideoStatus::Pending),
            "PROCESSING" => Ok(VideoStatus::Processing),
            "COMPLETED" => Ok(VideoStatus::Completed),
            "FAILED" => Ok(VideoStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid video status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Video {
    pub id: Uuid,
    pub user_id: i64,
    pub filename: String,
    /// Object key of the uploaded original
    pub source_key: String,
    pub status: VideoStatus,
    /// Frames sampled per second of video
    pub fps: i32,
    pub frame_count: Option<i32>,
    pub archive_key: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl Video {
    /// A freshly admitted video. `expires_at` is fixed here and never extended.
    pub fn new_pending(
        id: Uuid,
        user_id: i64,
        filename: String,
        source_key: String,
        fps: i32,
        retention: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            filename,
            source_key,
            status: VideoStatus::Pending,
            fps,
            frame_count: None,
            archive_key: None,
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            expires_at: now + retention,
        }
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }

    /// Completed and carrying an archive key
    pub fn is_downloadable(&self) -> bool {
        self.status == VideoStatus::Completed && self.archive_key.is_some()
    }

    /// Name offered to the client for the frames archive
    pub fn archive_filename(&self) -> String {
        format!("{}.zip", self.filename)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadVideoResponse {
    pub video_id: Uuid,
    pub filename: String,
    pub status: VideoStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoStatusResponse {
    pub video_id: Uuid,
    pub filename: String,
    pub status: VideoStatus,
    pub frame_count: Option<i32>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Video> for VideoStatusResponse {
    fn from(video: Video) -> Self {
        Self {
            video_id: video.id,
            filename: video.filename,
            status: video.status,
            frame_count: video.frame_count,
            error_message: video.error_message,
            created_at: video.created_at,
            started_at: video.started_at,
            completed_at: video.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoListItem {
    pub id: Uuid,
    pub filename: String,
    pub status: VideoStatus,
    pub frame_count: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Video> for VideoListItem {
    fn from(video: Video) -> Self {
        Self {
            id: video.id,
            filename: video.filename,
            status: video.status,
            frame_count: video.frame_count,
            created_at: video.created_at,
            completed_at: video.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoListResponse {
    pub videos: Vec<VideoListItem>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadResponse {
    pub download_url: String,
    pub filename: String,
    pub expires_in: u64,
}
