//! Configuration module
//!
//! Transcode settings are loaded from the environment once at startup and
//! passed by value into the pipeline. There is no global lookup.

use std::env;

const IMAGE_FRAME_OFFSET_SECS: u32 = 10;
const VIDEO_WIDTH: u32 = 640;
const ENCODE_TIMEOUT_SECS: u64 = 300;
const ENCODER_THREADS: u32 = 4;

/// Settings for the probe/encode toolchain and format selection.
#[derive(Clone, Debug)]
pub struct TranscodeConfig {
    /// Default timestamp (seconds) for thumbnail frame extraction.
    pub image_frame_offset_secs: u32,
    /// Target width for every delivery variant; height keeps aspect ratio.
    pub video_width: u32,
    pub format_mp4: bool,
    pub format_ogg: bool,
    pub format_webm: bool,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub encode_timeout_secs: u64,
    pub encoder_threads: u32,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        TranscodeConfig {
            image_frame_offset_secs: IMAGE_FRAME_OFFSET_SECS,
            video_width: VIDEO_WIDTH,
            format_mp4: true,
            format_ogg: true,
            format_webm: true,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            encode_timeout_secs: ENCODE_TIMEOUT_SECS,
            encoder_threads: ENCODER_THREADS,
            allowed_extensions: default_extensions(),
            allowed_content_types: default_content_types(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    ["mp4", "mov", "avi", "mkv", "webm", "ogg", "ogv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_content_types() -> Vec<String> {
    [
        "video/mp4",
        "video/quicktime",
        "video/x-msvideo",
        "video/x-matroska",
        "video/webm",
        "video/ogg",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl TranscodeConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let config = TranscodeConfig {
            image_frame_offset_secs: env::var("VIDMILL_IMAGE_FRAME_OFFSET_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(IMAGE_FRAME_OFFSET_SECS),
            video_width: env::var("VIDMILL_VIDEO_WIDTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(VIDEO_WIDTH),
            format_mp4: env_bool("VIDMILL_FORMAT_MP4", true),
            format_ogg: env_bool("VIDMILL_FORMAT_OGG", true),
            format_webm: env_bool("VIDMILL_FORMAT_WEBM", true),
            ffmpeg_path: env::var("VIDMILL_FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("VIDMILL_FFPROBE_PATH")
                .unwrap_or_else(|_| "ffprobe".to_string()),
            encode_timeout_secs: env::var("VIDMILL_ENCODE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(ENCODE_TIMEOUT_SECS),
            encoder_threads: env::var("VIDMILL_ENCODER_THREADS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(ENCODER_THREADS),
            allowed_extensions: env_list("VIDMILL_ALLOWED_EXTENSIONS")
                .unwrap_or_else(default_extensions),
            allowed_content_types: env_list("VIDMILL_ALLOWED_CONTENT_TYPES")
                .unwrap_or_else(default_content_types),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.video_width == 0 {
            return Err(anyhow::anyhow!("VIDMILL_VIDEO_WIDTH must be greater than 0"));
        }
        if self.encode_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "VIDMILL_ENCODE_TIMEOUT_SECS must be greater than 0"
            ));
        }
        if self.ffmpeg_path.trim().is_empty() || self.ffprobe_path.trim().is_empty() {
            return Err(anyhow::anyhow!("encoder binary paths must not be empty"));
        }
        Ok(())
    }

    pub fn any_format_enabled(&self) -> bool {
        self.format_mp4 || self.format_ogg || self.format_webm
    }
}
