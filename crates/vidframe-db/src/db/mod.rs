//! Database repositories
//!
//! Each capability is a trait so the services can be exercised without a
//! database. `Pg*` types talk to PostgreSQL; `InMemory*` types keep state in
//! process.

pub mod memory;
pub mod notification;
pub mod user;
pub mod video;

pub use memory::{InMemoryNotificationRepository, InMemoryUserDirectory, InMemoryVideoRepository};
pub use notification::{NotificationRepository, PgNotificationRepository};
pub use user::{PgUserDirectory, UserDirectory};
pub use video::{ClaimOutcome, PgVideoRepository, VideoRepository};
