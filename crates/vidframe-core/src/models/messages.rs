//! Payloads exchanged over the message queues.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::video::VideoStatus;

/// Published by the gateway on `video.processing.queue` once a video is admitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingJob {
    pub video_id: Uuid,
    pub user_id: i64,
    pub s3_key: String,
    pub filename: String,
}

/// Published by the frame worker on `video.notification.queue` when a job ends.
///
/// `user_id` is optional on the wire; consumers treat a missing value as unknown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoEvent {
    pub video_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub status: VideoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl VideoEvent {
    pub fn completed(video_id: Uuid, user_id: i64, frame_count: i32) -> Self {
        Self {
            video_id,
            user_id: Some(user_id),
            status: VideoStatus::Completed,
            frame_count: Some(frame_count),
            error_message: None,
        }
    }

    pub fn failed(video_id: Uuid, user_id: Option<i64>, error_message: impl Into<String>) -> Self {
        Self {
            video_id,
            user_id,
            status: VideoStatus::Failed,
            frame_count: None,
            error_message: Some(error_message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_uses_wire_field_names() {
        let job = ProcessingJob {
            video_id: Uuid::nil(),
            user_id: 7,
            s3_key: "uploads/00000000-0000-0000-0000-000000000000/clip.mp4".to_string(),
            filename: "clip.mp4".to_string(),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["user_id"], 7);
        assert_eq!(value["s3_key"], job.s3_key);
        assert_eq!(value["video_id"], "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn event_omits_unset_fields() {
        let event = VideoEvent::completed(Uuid::nil(), 7, 42);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], "COMPLETED");
        assert_eq!(value["frame_count"], 42);
        assert!(value.get("error_message").is_none());
    }

    #[test]
    fn event_without_user_id_decodes_as_unknown() {
        let raw = r#"{"video_id":"00000000-0000-0000-0000-000000000000","status":"FAILED","error_message":"boom"}"#;
        let event: VideoEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.user_id, None);
        assert_eq!(event.status, VideoStatus::Failed);
        assert_eq!(event.error_message.as_deref(), Some("boom"));
    }
}
