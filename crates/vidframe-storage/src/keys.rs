//! Shared object key generation.

use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// `uploads/{video_id}/{filename}`
pub fn upload_key(video_id: Uuid, filename: &str) -> String {
    format!("uploads/{}/{}", video_id, filename)
}

/// `processed/{video_id}/frames/`, always with the trailing separator
pub fn frames_prefix(video_id: Uuid) -> String {
    format!("processed/{}/frames/", video_id)
}

/// `processed/{video_id}/frames/{frame_file}`
pub fn frame_key(video_id: Uuid, frame_file: &str) -> String {
    format!("{}{}", frames_prefix(video_id), frame_file)
}

/// `processed/{video_id}/{filename}.zip`
pub fn archive_key(video_id: Uuid, filename: &str) -> String {
    format!("processed/{}/{}.zip", video_id, filename)
}

/// Last path segment of a key (or of a client supplied file name).
///
/// Both separators are honoured so Windows-style names reduce the same way.
pub fn base_name(key: &str) -> &str {
    key.rsplit(['/', '\\']).next().unwrap_or(key)
}

/// Reject keys that could leave the store's namespace: a leading `/`, a
/// backslash, or a `..` segment. Dots inside a segment (`my..clip.mp4`) are fine.
pub fn check_key(key: &str) -> StorageResult<()> {
    if key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
