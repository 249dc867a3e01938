//! Request authentication
//!
//! Users present an HS256 bearer token issued elsewhere; the gateway only
//! validates it. Internal routes are guarded by an optional shared key.

pub mod internal;
pub mod jwt;
pub mod middleware;

pub use internal::{internal_key_middleware, InternalKey, INTERNAL_KEY_HEADER};
pub use jwt::{Claims, JwtValidator};
pub use middleware::{auth_middleware, AuthUser};
