//! Frame extraction with ffmpeg

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Output pattern handed to ffmpeg; produces `frame_0001.jpg`, `frame_0002.jpg`, ...
pub const FRAME_PATTERN: &str = "frame_%04d.jpg";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to execute ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("ffmpeg timed out after {0} seconds")]
    Timeout(u64),

    #[error("no frames extracted")]
    NoFrames,

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(i32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Samples still frames from a video file into a directory
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Write frames for `input` into `output_dir` at `fps` frames per second and
    /// return their paths sorted by file name. Zero frames is an error.
    async fn extract(
        &self,
        input: &Path,
        output_dir: &Path,
        fps: i32,
    ) -> Result<Vec<PathBuf>, ExtractionError>;
}

/// Frame files in `dir`, sorted by name
pub async fn collect_frames(dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file()
            && path.extension().and_then(|s| s.to_str()) == Some("jpg")
        {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FfmpegFrameExtractor {
    pub fn new(ffmpeg_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }

    fn args(input: &Path, output_dir: &Path, fps: i32) -> Vec<String> {
        vec![
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vf".to_string(),
            format!("fps={}", fps),
            "-qscale:v".to_string(),
            "2".to_string(),
            output_dir.join(FRAME_PATTERN).to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    #[tracing::instrument(skip(self, input, output_dir), fields(input = %input.display()))]
    async fn extract(
        &self,
        input: &Path,
        output_dir: &Path,
        fps: i32,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        if fps <= 0 {
            return Err(ExtractionError::InvalidFrameRate(fps));
        }
        tokio::fs::create_dir_all(output_dir).await?;

        let child = Command::new(&self.ffmpeg_path)
            .args(Self::args(input, output_dir, fps))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ExtractionError::Spawn)?;

        // On timeout the future is dropped, which kills the child
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout.as_secs()))?
            .map_err(ExtractionError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // ffmpeg prints its banner first; the cause is at the end
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(ExtractionError::Failed {
                status: output.status.to_string(),
                stderr: tail,
            });
        }

        let frames = collect_frames(output_dir).await?;
        if frames.is_empty() {
            return Err(ExtractionError::NoFrames);
        }

        tracing::debug!(frame_count = frames.len(), fps, "Frames extracted");
        Ok(frames)
    }
}

/// Extractor that writes a fixed number of placeholder frames, or fails.
/// Used by tests in place of ffmpeg.
#[derive(Debug, Clone)]
pub struct ScriptedFrameExtractor {
    frames: usize,
    failure: Option<String>,
}

impl ScriptedFrameExtractor {
    pub fn producing(frames: usize) -> Self {
        Self {
            frames,
            failure: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            frames: 0,
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl FrameExtractor for ScriptedFrameExtractor {
    async fn extract(
        &self,
        _input: &Path,
        output_dir: &Path,
        _fps: i32,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        if let Some(message) = &self.failure {
            return Err(ExtractionError::Failed {
                status: "exit status: 1".to_string(),
                stderr: message.clone(),
            });
        }
        tokio::fs::create_dir_all(output_dir).await?;
        for n in 1..=self.frames {
            let path = output_dir.join(format!("frame_{:04}.jpg", n));
            tokio::fs::write(&path, format!("frame {}", n)).await?;
        }
        let frames = collect_frames(output_dir).await?;
        if frames.is_empty() {
            return Err(ExtractionError::NoFrames);
        }
        Ok(frames)
    }
}
