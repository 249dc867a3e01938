//! Mail transport

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Error)]
pub enum MailError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mail configuration error: {0}")]
    Config(String),
}

impl MailError {
    /// Whether sending the same mail again could succeed. A bad address or a
    /// message that cannot be built fails the same way every time.
    pub fn is_transient(&self) -> bool {
        matches!(self, MailError::Transport(_) | MailError::Config(_))
    }
}

/// An outgoing plain-text email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

#[cfg(feature = "smtp")]
pub use smtp::SmtpMailer;

#[cfg(feature = "smtp")]
mod smtp {
    use super::*;
    use lettre::message::header::ContentType;
    use lettre::message::Mailbox;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
    use std::sync::Arc;
    use vidframe_core::Config;

    /// SMTP delivery through lettre
    #[derive(Clone)]
    pub struct SmtpMailer {
        transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
        from: Mailbox,
    }

    impl SmtpMailer {
        pub fn from_config(config: &Config) -> Result<Self, MailError> {
            let host = config
                .smtp_host()
                .ok_or_else(|| MailError::Config("SMTP_HOST is not set".to_string()))?;
            let from_raw = config
                .smtp_from()
                .ok_or_else(|| MailError::Config("SMTP_FROM is not set".to_string()))?;
            let from: Mailbox = from_raw.parse().map_err(|e: lettre::address::AddressError| {
                MailError::InvalidAddress {
                    address: from_raw.to_string(),
                    reason: e.to_string(),
                }
            })?;
            let port = config.smtp_port();
            let credentials = match (config.smtp_user(), config.smtp_password()) {
                (Some(user), Some(password)) => {
                    Some(Credentials::new(user.to_string(), password.to_string()))
                }
                _ => None,
            };

            let transport = if config.smtp_tls() {
                let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(|e| MailError::Config(e.to_string()))?
                    .port(port);
                let builder = match credentials {
                    Some(c) => builder.credentials(c),
                    None => builder,
                };
                tracing::info!(host = %host, port, "SMTP mailer initialized (STARTTLS)");
                builder.build()
            } else {
                let builder =
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port);
                let builder = match credentials {
                    Some(c) => builder.credentials(c),
                    None => builder,
                };
                tracing::info!(host = %host, port, "SMTP mailer initialized");
                builder.build()
            };

            Ok(Self {
                transport: Arc::new(transport),
                from,
            })
        }
    }

    #[async_trait]
    impl Mailer for SmtpMailer {
        async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
            let to: Mailbox = mail.to.parse().map_err(|e: lettre::address::AddressError| {
                MailError::InvalidAddress {
                    address: mail.to.clone(),
                    reason: e.to_string(),
                }
            })?;

            let message = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(mail.subject.as_str())
                .header(ContentType::TEXT_PLAIN)
                .body(mail.body.clone())
                .map_err(|e| MailError::Build(e.to_string()))?;

            self.transport
                .send(message)
                .await
                .map_err(|e| MailError::Transport(e.to_string()))?;
            Ok(())
        }
    }
}

/// Keeps sent mail in memory. Can be told to fail, to exercise delivery errors.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    failure: Mutex<Option<MailError>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send with a transport error carrying `message`
    pub async fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().await = message.map(|m| MailError::Transport(m.to_string()));
    }

    /// Fail every send with `error`
    pub async fn fail_with_error(&self, error: MailError) {
        *self.failure.lock().await = Some(error);
    }

    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if let Some(error) = self.failure.lock().await.clone() {
            return Err(error);
        }
        self.sent.lock().await.push(mail.clone());
        Ok(())
    }
}
