//! Transcode engine - resized variant encoding and frame extraction

use crate::probe::validate_binary_path;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("invalid source dimensions: source width must be non-zero")]
    InvalidDimensions,

    #[error("no frame produced at {timestamp} seconds")]
    FrameExtraction { timestamp: f64 },

    #[error("encode exceeded {0} second timeout")]
    Timeout(u64),

    #[error("encode failed: {0}")]
    EncodeFailed(String),

    #[error("encoder binary misconfigured: {0}")]
    InvalidBinary(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Height for a resize to `target_width` that preserves aspect ratio.
///
/// The result is decremented to the next even number when odd; common
/// encoders reject odd frame heights.
pub fn scaled_height(
    target_width: u32,
    source_width: u32,
    source_height: u32,
) -> Result<u32, TranscodeError> {
    if source_width == 0 {
        return Err(TranscodeError::InvalidDimensions);
    }

    let height = (f64::from(target_width) * f64::from(source_height) / f64::from(source_width))
        .round() as u32;

    if height % 2 != 0 {
        Ok(height - 1)
    } else {
        Ok(height)
    }
}

/// Wraps the encode tool: extracts still frames and emits resized encoded
/// variants. One call per output; calls are independent of each other.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Extract a single frame at `at_seconds` as an image.
    async fn extract_frame(&self, source: &Path, at_seconds: f64) -> Result<Bytes, TranscodeError>;

    /// Encode one delivery variant resized to `width` x `height`.
    async fn encode_variant(
        &self,
        source: &Path,
        width: u32,
        height: u32,
        codec: vidmill_core::CodecSpec,
    ) -> Result<Bytes, TranscodeError>;
}

pub struct FfmpegEngine {
    ffmpeg_path: String,
    timeout: Duration,
    threads: u32,
}

impl FfmpegEngine {
    pub fn new(
        ffmpeg_path: impl Into<String>,
        timeout_secs: u64,
        threads: u32,
    ) -> Result<Self, TranscodeError> {
        let ffmpeg_path = ffmpeg_path.into();
        validate_binary_path(&ffmpeg_path).map_err(TranscodeError::InvalidBinary)?;

        Ok(FfmpegEngine {
            ffmpeg_path,
            timeout: Duration::from_secs(timeout_secs),
            threads,
        })
    }

    /// Run ffmpeg under the configured timeout. The child is spawned with
    /// kill-on-drop so an expired timeout also terminates the process.
    async fn run_ffmpeg(&self, args: Vec<String>) -> Result<(), TranscodeError> {
        let child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "ffmpeg exceeded timeout, killing"
                );
                return Err(TranscodeError::Timeout(self.timeout.as_secs()));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::EncodeFailed(stderr.into_owned()));
        }

        Ok(())
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    #[tracing::instrument(skip(self, source), fields(ffmpeg.operation = "frame"))]
    async fn extract_frame(&self, source: &Path, at_seconds: f64) -> Result<Bytes, TranscodeError> {
        let output_temp = tempfile::Builder::new()
            .suffix(".jpg")
            .tempfile()?;
        let output_path = output_temp.path();

        let args = vec![
            "-ss".to_string(),
            at_seconds.to_string(),
            "-i".to_string(),
            source.to_string_lossy().into_owned(),
            "-vframes".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            "-y".to_string(),
            output_path.to_string_lossy().into_owned(),
        ];

        self.run_ffmpeg(args).await?;

        let frame = tokio::fs::read(output_path).await?;
        if frame.is_empty() {
            return Err(TranscodeError::FrameExtraction {
                timestamp: at_seconds,
            });
        }

        Ok(Bytes::from(frame))
    }

    #[tracing::instrument(
        skip(self, source),
        fields(ffmpeg.operation = "encode", codec = ?codec)
    )]
    async fn encode_variant(
        &self,
        source: &Path,
        width: u32,
        height: u32,
        codec: vidmill_core::CodecSpec,
    ) -> Result<Bytes, TranscodeError> {
        let start = std::time::Instant::now();

        let output_temp = tempfile::Builder::new()
            .suffix(&format!(".{}", codec.container_extension()))
            .tempfile()?;
        let output_path = output_temp.path();

        let args = vec![
            "-i".to_string(),
            source.to_string_lossy().into_owned(),
            "-vf".to_string(),
            format!("scale={}:{}", width, height),
            "-c:v".to_string(),
            codec.video_codec().to_string(),
            "-c:a".to_string(),
            codec.audio_codec().to_string(),
            "-threads".to_string(),
            self.threads.to_string(),
            "-y".to_string(),
            output_path.to_string_lossy().into_owned(),
        ];

        self.run_ffmpeg(args).await?;

        let data = tokio::fs::read(output_path).await?;
        if data.is_empty() {
            return Err(TranscodeError::EncodeFailed(
                "encoder produced no output".to_string(),
            ));
        }

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            size_bytes = data.len(),
            width,
            height,
            "Variant encoded"
        );

        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_height_matches_formula() {
        // 640 * 1080 / 1920 = 360, already even
        assert_eq!(scaled_height(640, 1920, 1080).unwrap(), 360);
        // 640 * 480 / 640 = 480
        assert_eq!(scaled_height(640, 640, 480).unwrap(), 480);
    }

    #[test]
    fn odd_heights_are_decremented() {
        // 640 * 719 / 1280 = 359.5 -> rounds to 360 (even)
        assert_eq!(scaled_height(640, 1280, 719).unwrap(), 360);
        // 640 * 361 / 640 = 361 (odd) -> 360
        assert_eq!(scaled_height(640, 640, 361).unwrap(), 360);
        // 500 * 333 / 500 = 333 (odd) -> 332
        assert_eq!(scaled_height(500, 500, 333).unwrap(), 332);
    }

    #[test]
    fn scaled_height_always_even() {
        for (tw, sw, sh) in [
            (640u32, 1920u32, 1080u32),
            (640, 1280, 720),
            (640, 854, 480),
            (640, 640, 361),
            (640, 601, 333),
            (320, 1234, 567),
            (1280, 999, 747),
        ] {
            let h = scaled_height(tw, sw, sh).unwrap();
            assert_eq!(h % 2, 0, "height {h} for {tw}/{sw}/{sh} is odd");

            let exact = (f64::from(tw) * f64::from(sh) / f64::from(sw)).round() as u32;
            assert!(h == exact || h == exact - 1);
        }
    }

    #[test]
    fn zero_source_width_is_invalid() {
        assert!(matches!(
            scaled_height(640, 0, 480),
            Err(TranscodeError::InvalidDimensions)
        ));
    }

    #[test]
    fn engine_rejects_dangerous_binary_path() {
        assert!(FfmpegEngine::new("ffmpeg | cat", 300, 4).is_err());
        assert!(FfmpegEngine::new("/usr/bin/ffmpeg", 300, 4).is_ok());
    }
}
