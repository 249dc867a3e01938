//! HTTP surface constants

pub const API_VERSION: &str = "v1";

/// Prefix of every user-facing route
pub const API_PREFIX: &str = "/api/v1";

pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// Allowance for multipart framing on top of the largest accepted video
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;
