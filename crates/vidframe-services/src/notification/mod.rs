//! Completion notifier
//!
//! Turns video events into emails to the video's owner and keeps a delivery
//! log. Transport failures are recorded and handed back to the queue for
//! redelivery. A mail that can never be sent (bad address, unbuildable
//! message) is recorded and rejected, as is an event whose recipient cannot
//! be resolved.

pub mod mailer;

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::Instrument;

use vidframe_core::{
    NewNotification, NotificationChannel, TaskError, VideoEvent, VideoStatus,
};
use vidframe_db::{NotificationRepository, UserDirectory, VideoRepository};
use vidframe_queue::{Delivery, MessageHandler};

pub use mailer::{MailError, Mailer, OutgoingMail, RecordingMailer};
#[cfg(feature = "smtp")]
pub use mailer::SmtpMailer;

pub const COMPLETED_SUBJECT: &str = "Video Processing Completed";
pub const FAILED_SUBJECT: &str = "Video Processing Failed";

/// Subject and plain-text body for an event
pub fn render(event: &VideoEvent) -> (&'static str, String) {
    if event.status == VideoStatus::Completed {
        let body = format!(
            "Your video (ID: {}) has been processed successfully!\n\n\
             Frames extracted: {}\n\
             You can now download the ZIP file from the application.\n\n\
             Thank you for using our service!",
            event.video_id,
            event.frame_count.unwrap_or(0)
        );
        (COMPLETED_SUBJECT, body)
    } else {
        let body = format!(
            "Unfortunately, your video (ID: {}) processing failed.\n\n\
             Error: {}\n\n\
             Please try uploading again or contact support.",
            event.video_id,
            event.error_message.as_deref().unwrap_or_default()
        );
        (FAILED_SUBJECT, body)
    }
}

pub struct CompletionNotifier {
    videos: Arc<dyn VideoRepository>,
    notifications: Arc<dyn NotificationRepository>,
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
    span: tracing::Span,
}

impl CompletionNotifier {
    pub fn new(
        videos: Arc<dyn VideoRepository>,
        notifications: Arc<dyn NotificationRepository>,
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
        span: tracing::Span,
    ) -> Self {
        Self {
            videos,
            notifications,
            users,
            mailer,
            span,
        }
    }

    pub async fn notify(&self, event: &VideoEvent) -> Result<(), TaskError> {
        let span = tracing::info_span!(
            parent: &self.span,
            "notify",
            video_id = %event.video_id,
            status = %event.status
        );
        self.notify_inner(event).instrument(span).await
    }

    async fn resolve_owner(&self, event: &VideoEvent) -> Result<i64, TaskError> {
        if let Some(user_id) = event.user_id {
            return Ok(user_id);
        }
        let video = self
            .videos
            .get(event.video_id)
            .await
            .map_err(|e| TaskError::recoverable(anyhow!(e).context("Failed to look up video owner")))?;
        video.map(|v| v.user_id).ok_or_else(|| {
            TaskError::unrecoverable(anyhow!(
                "cannot resolve owner of video {}",
                event.video_id
            ))
        })
    }

    async fn notify_inner(&self, event: &VideoEvent) -> Result<(), TaskError> {
        let user_id = self.resolve_owner(event).await?;

        let recipient = self
            .users
            .email_for(user_id)
            .await
            .map_err(|e| TaskError::recoverable(anyhow!(e).context("Failed to look up user email")))?
            .ok_or_else(|| {
                TaskError::unrecoverable(anyhow!("no email address for user {}", user_id))
            })?;

        let (subject, body) = render(event);

        let record = self
            .notifications
            .create(NewNotification {
                user_id,
                video_id: Some(event.video_id),
                channel: NotificationChannel::Email,
                recipient: recipient.clone(),
                subject: subject.to_string(),
            })
            .await
            .map_err(|e| {
                TaskError::recoverable(anyhow!(e).context("Failed to create notification record"))
            })?;

        tracing::info!(notification_id = record.id, user_id, "Sending email notification");

        let mail = OutgoingMail {
            to: recipient,
            subject: subject.to_string(),
            body,
        };

        if let Err(e) = self.mailer.send(&mail).await {
            let message = e.to_string();
            if let Err(update) = self.notifications.mark_failed(record.id, &message).await {
                tracing::error!(error = %update, notification_id = record.id, "Failed to mark notification as failed");
            }
            let transient = e.is_transient();
            let err = anyhow!(e).context("Failed to send email");
            return Err(if transient {
                TaskError::recoverable(err)
            } else {
                TaskError::unrecoverable(err)
            });
        }

        if let Err(e) = self.notifications.mark_sent(record.id).await {
            tracing::error!(error = %e, notification_id = record.id, "Failed to mark notification as sent");
        }

        tracing::info!(notification_id = record.id, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for CompletionNotifier {
    async fn handle(&self, delivery: &Delivery) -> Result<(), TaskError> {
        let event: VideoEvent = delivery.decode()?;
        self.notify(&event).await
    }
}
