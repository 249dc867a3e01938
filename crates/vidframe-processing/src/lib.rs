//! vidframe processing
//!
//! Everything that turns an uploaded video into frames: upload validation,
//! the ffmpeg frame extractor, zip archives of stored frames and the queue
//! handler that drives a video from PENDING to a terminal state.

pub mod archive;
pub mod extractor;
pub mod validator;
pub mod worker;

pub use archive::{ArchiveBuilder, ArchiveError, ArchiveResult};
pub use extractor::{
    ExtractionError, FfmpegFrameExtractor, FrameExtractor, ScriptedFrameExtractor,
};
pub use validator::{UploadValidator, ValidationError};
pub use worker::{FrameExtractionWorker, WorkerConfig};
