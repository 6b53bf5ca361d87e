//! Format descriptors: which renditions exist and how each is encoded.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use super::asset::THUMBNAIL_EXT;

/// Codec selection for one delivery variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecSpec {
    /// MP4 container, H.264 video, MP3 audio.
    H264,
    /// OGG container, Theora video, Vorbis audio.
    Theora,
    /// WebM container, VP8 video, Vorbis audio.
    Vp8,
}

impl CodecSpec {
    pub fn container_extension(&self) -> &'static str {
        match self {
            CodecSpec::H264 => "mp4",
            CodecSpec::Theora => "ogg",
            CodecSpec::Vp8 => "webm",
        }
    }

    pub fn video_codec(&self) -> &'static str {
        match self {
            CodecSpec::H264 => "libx264",
            CodecSpec::Theora => "libtheora",
            CodecSpec::Vp8 => "libvpx",
        }
    }

    pub fn audio_codec(&self) -> &'static str {
        match self {
            CodecSpec::H264 => "libmp3lame",
            CodecSpec::Theora => "libvorbis",
            CodecSpec::Vp8 => "libvorbis",
        }
    }
}

/// What a format resolves to. Resolved once at registry load; no string
/// matching afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    /// The stored original.
    Reference,
    /// The extracted thumbnail frame next to the original.
    Admin,
    /// The admin-panel thumbnail rendition.
    ThumbAdmin,
    /// A transcoded delivery variant.
    Delivery(CodecSpec),
}

/// One resolvable rendition of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub name: String,
    pub kind: FormatKind,
    pub extension: String,
}

impl FormatDescriptor {
    pub fn reference() -> Self {
        FormatDescriptor {
            name: "reference".to_string(),
            kind: FormatKind::Reference,
            extension: String::new(),
        }
    }

    pub fn admin() -> Self {
        FormatDescriptor {
            name: "admin".to_string(),
            kind: FormatKind::Admin,
            extension: THUMBNAIL_EXT.to_string(),
        }
    }

    pub fn thumb_admin() -> Self {
        FormatDescriptor {
            name: "thumb_admin".to_string(),
            kind: FormatKind::ThumbAdmin,
            extension: THUMBNAIL_EXT.to_string(),
        }
    }

    pub fn delivery(codec: CodecSpec) -> Self {
        let ext = codec.container_extension();
        FormatDescriptor {
            name: format!("videos_{}", ext),
            kind: FormatKind::Delivery(codec),
            extension: ext.to_string(),
        }
    }

    pub fn is_delivery(&self) -> bool {
        matches!(self.kind, FormatKind::Delivery(_))
    }

    /// Metadata key flagging this variant as available, e.g. `mp4_available`.
    pub fn availability_key(&self) -> Option<String> {
        match self.kind {
            FormatKind::Delivery(_) => Some(format!("{}_available", self.extension)),
            _ => None,
        }
    }

    /// Metadata key recording the generated output filename.
    pub fn filename_key(&self) -> Option<String> {
        match self.kind {
            FormatKind::Delivery(_) => Some(format!("filename_{}", self.extension)),
            _ => None,
        }
    }
}

/// Player flags carried on the asset under the `options` metadata key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerOptions {
    pub autoplay: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub muted: bool,
    pub controls: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        PlayerOptions {
            autoplay: false,
            looping: false,
            muted: false,
            controls: true,
        }
    }
}

impl PlayerOptions {
    pub fn to_value(self) -> JsonValue {
        json!({
            "autoplay": self.autoplay,
            "loop": self.looping,
            "muted": self.muted,
            "controls": self.controls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_names_follow_container() {
        assert_eq!(FormatDescriptor::delivery(CodecSpec::H264).name, "videos_mp4");
        assert_eq!(FormatDescriptor::delivery(CodecSpec::Theora).name, "videos_ogg");
        assert_eq!(FormatDescriptor::delivery(CodecSpec::Vp8).name, "videos_webm");
    }

    #[test]
    fn availability_and_filename_keys() {
        let mp4 = FormatDescriptor::delivery(CodecSpec::H264);
        assert_eq!(mp4.availability_key().as_deref(), Some("mp4_available"));
        assert_eq!(mp4.filename_key().as_deref(), Some("filename_mp4"));

        assert_eq!(FormatDescriptor::reference().availability_key(), None);
        assert_eq!(FormatDescriptor::thumb_admin().filename_key(), None);
    }

    #[test]
    fn codec_mapping() {
        assert_eq!(CodecSpec::H264.video_codec(), "libx264");
        assert_eq!(CodecSpec::H264.audio_codec(), "libmp3lame");
        assert_eq!(CodecSpec::Theora.video_codec(), "libtheora");
        assert_eq!(CodecSpec::Vp8.video_codec(), "libvpx");
        assert_eq!(CodecSpec::Vp8.audio_codec(), "libvorbis");
    }

    #[test]
    fn player_options_default_has_controls() {
        let opts = PlayerOptions::default();
        assert!(opts.controls);
        assert!(!opts.autoplay);

        let value = opts.to_value();
        assert_eq!(value["controls"], true);
        assert_eq!(value["loop"], false);
    }
}
