//! vidframe core library
//!
//! Domain models, queue payloads, error types and configuration shared by the
//! gateway, the frame worker, the notifier and the retention sweeper.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod task_error;

// Re-export commonly used types
pub use config::{Config, QueueBackend, ServiceRole, VidframeConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    NewNotification, Notification, NotificationChannel, NotificationStatus, ProcessingJob,
    Video, VideoEvent, VideoStatus,
};
pub use storage_types::StorageBackend;
pub use task_error::{TaskError, TaskResultExt};
