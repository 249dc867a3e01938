//! vidframe infrastructure
//!
//! Cross-cutting pieces every binary needs: the tracing subscriber, the
//! request id middleware and shutdown signal handling.

pub mod middleware;
pub mod shutdown;
pub mod telemetry;

pub use middleware::{get_request_id, request_id_middleware, RequestId, REQUEST_ID_HEADER};
pub use shutdown::{shutdown_signal, shutdown_token};
pub use telemetry::init_telemetry;
