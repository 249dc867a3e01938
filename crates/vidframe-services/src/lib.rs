//! vidframe services
//!
//! Business services shared by the binaries: upload admission and the video
//! catalog (gateway), the completion notifier and the retention sweeper.
//! HTTP handling stays in vidframe-api; these types only speak domain models
//! and `AppError`.

pub mod admission;
pub mod catalog;
pub mod notification;
pub mod retention;

pub use admission::{AdmissionConfig, UploadAdmission};
pub use catalog::{normalize_paging, VideoCatalog};
#[cfg(feature = "smtp")]
pub use notification::SmtpMailer;
pub use notification::{CompletionNotifier, MailError, Mailer, OutgoingMail, RecordingMailer};
pub use retention::{RetentionSweeper, SweepReport};
