pub mod messages;
pub mod notification;
pub mod video;

pub use messages::{ProcessingJob, VideoEvent};
pub use notification::{NewNotification, Notification, NotificationChannel, NotificationStatus};
pub use video::{
    DownloadResponse, UploadVideoResponse, Video, VideoListItem, VideoListResponse, VideoStatus,
    VideoStatusResponse,
};
