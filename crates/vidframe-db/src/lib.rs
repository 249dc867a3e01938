//! vidframe persistence layer
//!
//! Repository traits for videos, notifications and the user directory, with a
//! PostgreSQL implementation (sqlx) and an in-memory one for tests and
//! single-process development.

pub mod db;

pub use db::{
    ClaimOutcome, InMemoryNotificationRepository, InMemoryUserDirectory,
    InMemoryVideoRepository, NotificationRepository, PgNotificationRepository,
    PgUserDirectory, PgVideoRepository, UserDirectory, VideoRepository,
};
