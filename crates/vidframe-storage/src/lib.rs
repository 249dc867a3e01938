//! vidframe storage library
//!
//! Object store abstraction used by every vidframe process, with S3 (and
//! S3-compatible) and local filesystem backends.
//!
//! # Key layout
//!
//! - `uploads/{video_id}/{filename}`: uploaded original
//! - `processed/{video_id}/frames/{frame_file}`: extracted frames
//! - `processed/{video_id}/{filename}.zip`: frames archive
//!
//! Keys must not contain a `..` segment or a leading `/`. Key generation lives in [`keys`]
//! so the gateway, worker and sweeper agree on it.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
pub use vidframe_core::StorageBackend;
