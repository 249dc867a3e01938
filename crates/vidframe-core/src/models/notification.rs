use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "notification_channel", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationChannel {
    Email,
}

/// Delivery state of a notification. `Pending` moves to exactly one of the others.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "notification_status", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl Display for NotificationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            NotificationStatus::Pending => write!(f, "PENDING"),
            NotificationStatus::Sent => write!(f, "SENT"),
            NotificationStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub video_id: Option<Uuid>,
    pub channel: NotificationChannel,
    pub status: NotificationStatus,
    pub recipient: String,
    pub subject: String,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when a notification is first recorded
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub video_id: Option<Uuid>,
    pub channel: NotificationChannel,
    pub recipient: String,
    pub subject: String,
}
