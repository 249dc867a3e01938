//! Application-wide constants.

/// Queue carrying [`crate::ProcessingJob`] messages from the gateway to the frame worker.
pub const PROCESSING_QUEUE: &str = "video.processing.queue";

/// Queue carrying [`crate::VideoEvent`] messages from the frame worker to the notifier.
pub const NOTIFICATION_QUEUE: &str = "video.notification.queue";

/// Lifetime of presigned archive download URLs.
pub const DOWNLOAD_URL_EXPIRY_SECS: u64 = 900;

pub const DEFAULT_LIST_LIMIT: i64 = 20;
pub const MAX_LIST_LIMIT: i64 = 100;

pub const DEFAULT_RETENTION_DAYS: i64 = 15;
pub const DEFAULT_MAX_VIDEO_SIZE_MB: usize = 500;
pub const DEFAULT_VIDEO_EXTENSIONS: &str = "mp4,avi,mov,mkv,webm";

/// Frames sampled per second of video when nothing else is configured.
pub const DEFAULT_FRAME_RATE: i32 = 1;

/// Name of the multipart field holding the uploaded video.
pub const UPLOAD_FIELD_NAME: &str = "video";
