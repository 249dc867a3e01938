//! vidframe API library
//!
//! The HTTP gateway (handlers, auth, error rendering, routes) and the setup
//! code shared by the four binaries: `vidframe-api`, `vidframe-worker`,
//! `vidframe-notifier` and `vidframe-sweeper`.

mod api_doc;
pub mod auth;
pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;

pub use api_doc::ApiDoc;
pub use error::{ErrorResponse, HttpAppError};
pub use handlers::health::HealthResponse;
pub use handlers::internal_zip::{ZipCreateRequest, ZipCreateResponse};
pub use state::AppState;
