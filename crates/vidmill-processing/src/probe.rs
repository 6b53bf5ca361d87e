//! Probe adapter - stream metadata extraction via ffprobe

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("source unreadable: {path}: {message}")]
    Unreadable { path: String, message: String },

    #[error("no video stream found in source")]
    NoVideoStream,

    #[error("unparseable probe output: {0}")]
    InvalidOutput(String),

    #[error("probe binary misconfigured: {0}")]
    InvalidBinary(String),

    #[error("failed to execute ffprobe: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Metadata of the first video stream in a source file.
///
/// Bitrate and frame count are not reported for every container; they are
/// absent rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Duration in seconds, fractional.
    pub duration: f64,
    pub bitrate: Option<u64>,
    pub frame_count: Option<u64>,
}

/// Pure query over a video source. No mutation.
#[async_trait]
pub trait VideoProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<StreamInfo, ProbeError>;
}

/// Reject binary paths carrying shell metacharacters.
pub(crate) fn validate_binary_path(path: &str) -> Result<(), String> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(format!("path contains dangerous characters: {}", path));
    }
    if path.contains("..") {
        return Err(format!("path contains directory traversal: {}", path));
    }
    Ok(())
}

pub struct FfprobeAdapter {
    ffprobe_path: String,
}

impl FfprobeAdapter {
    pub fn new(ffprobe_path: impl Into<String>) -> Result<Self, ProbeError> {
        let ffprobe_path = ffprobe_path.into();
        validate_binary_path(&ffprobe_path).map_err(ProbeError::InvalidBinary)?;
        Ok(FfprobeAdapter { ffprobe_path })
    }
}

#[async_trait]
impl VideoProbe for FfprobeAdapter {
    #[tracing::instrument(skip(self, path), fields(ffmpeg.operation = "probe"))]
    async fn probe(&self, path: &Path) -> Result<StreamInfo, ProbeError> {
        let start = std::time::Instant::now();

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProbeError::Unreadable {
                path: path.display().to_string(),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let info = parse_probe_output(&output.stdout)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            video_duration = info.duration,
            width = info.width,
            height = info.height,
            "Video probe completed"
        );

        Ok(info)
    }
}

/// Parse ffprobe `-print_format json` output into a [`StreamInfo`].
fn parse_probe_output(stdout: &[u8]) -> Result<StreamInfo, ProbeError> {
    let probe_data: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| ProbeError::InvalidOutput(e.to_string()))?;

    let stream = probe_data["streams"]
        .get(0)
        .ok_or(ProbeError::NoVideoStream)?;

    let format = &probe_data["format"];

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| ProbeError::InvalidOutput("could not parse width".to_string()))?
        as u32;

    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| ProbeError::InvalidOutput("could not parse height".to_string()))?
        as u32;

    // Container-level duration is the more reliable one; fall back to the
    // stream's own when absent.
    let duration = format["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            stream["duration"]
                .as_str()
                .and_then(|d| d.parse::<f64>().ok())
        })
        .ok_or_else(|| ProbeError::InvalidOutput("could not parse duration".to_string()))?;

    let bitrate = format["bit_rate"]
        .as_str()
        .and_then(|b| b.parse::<u64>().ok())
        .or_else(|| {
            stream["bit_rate"]
                .as_str()
                .and_then(|b| b.parse::<u64>().ok())
        });

    let frame_count = stream["nb_frames"].as_str().and_then(|n| n.parse::<u64>().ok());

    Ok(StreamInfo {
        width,
        height,
        duration,
        bitrate,
        frame_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_json(streams: &str, format: &str) -> Vec<u8> {
        format!(r#"{{"streams": {streams}, "format": {format}}}"#).into_bytes()
    }

    #[test]
    fn parse_full_output() {
        let data = probe_json(
            r#"[{"width": 1920, "height": 1080, "duration": "12.0", "nb_frames": "300", "bit_rate": "900000"}]"#,
            r#"{"duration": "12.48", "bit_rate": "1200000"}"#,
        );
        let info = parse_probe_output(&data).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.duration, 12.48);
        assert_eq!(info.bitrate, Some(1_200_000));
        assert_eq!(info.frame_count, Some(300));
    }

    #[test]
    fn missing_optional_fields_are_absent_not_errors() {
        let data = probe_json(
            r#"[{"width": 640, "height": 480}]"#,
            r#"{"duration": "5.0"}"#,
        );
        let info = parse_probe_output(&data).unwrap();
        assert_eq!(info.bitrate, None);
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn stream_duration_fallback() {
        let data = probe_json(
            r#"[{"width": 640, "height": 480, "duration": "7.5"}]"#,
            r#"{}"#,
        );
        let info = parse_probe_output(&data).unwrap();
        assert_eq!(info.duration, 7.5);
    }

    #[test]
    fn no_streams_is_no_video_stream() {
        let data = probe_json(r#"[]"#, r#"{"duration": "5.0"}"#);
        assert!(matches!(
            parse_probe_output(&data),
            Err(ProbeError::NoVideoStream)
        ));
    }

    #[test]
    fn missing_width_is_invalid_output() {
        let data = probe_json(r#"[{"height": 480}]"#, r#"{"duration": "5.0"}"#);
        assert!(matches!(
            parse_probe_output(&data),
            Err(ProbeError::InvalidOutput(_))
        ));
    }

    #[test]
    fn garbage_output_is_invalid() {
        assert!(matches!(
            parse_probe_output(b"not json"),
            Err(ProbeError::InvalidOutput(_))
        ));
    }

    #[test]
    fn adapter_rejects_dangerous_binary_path() {
        assert!(FfprobeAdapter::new("ffprobe; rm -rf /").is_err());
        assert!(FfprobeAdapter::new("../ffprobe").is_err());
        assert!(FfprobeAdapter::new("/usr/bin/ffprobe").is_ok());
    }
}
