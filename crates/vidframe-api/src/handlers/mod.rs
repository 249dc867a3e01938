pub mod health;
pub mod internal_zip;
pub mod video_download;
pub mod video_get;
pub mod video_upload;
