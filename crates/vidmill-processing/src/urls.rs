//! URL generation for stored renditions.
//!
//! Private URLs are storage-relative keys; public URLs run through the
//! injected CDN capability for prefixing. Cache invalidation and path
//! strategy belong to that collaborator, not to this crate.

use crate::naming::{KeyResolver, NamingError};
use crate::registry::FormatRegistry;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::sync::Arc;
use thiserror::Error;
use vidmill_core::Asset;

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("unknown format: {0}")]
    UnknownFormat(String),

    #[error(transparent)]
    Naming(#[from] NamingError),
}

/// CDN path capability. The pipeline only needs prefixing.
pub trait Cdn: Send + Sync {
    fn path(&self, relative: &str) -> String;
}

/// CDN that serves artifacts straight from a base URL.
pub struct PassthroughCdn {
    base: String,
}

impl PassthroughCdn {
    pub fn new(base: impl Into<String>) -> Self {
        PassthroughCdn { base: base.into() }
    }
}

impl Cdn for PassthroughCdn {
    fn path(&self, relative: &str) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), relative)
    }
}

/// Resolves public and private URLs for every registered format.
pub struct UrlResolver {
    registry: FormatRegistry,
    keys: KeyResolver,
    cdn: Arc<dyn Cdn>,
}

impl UrlResolver {
    pub fn new(registry: FormatRegistry, keys: KeyResolver, cdn: Arc<dyn Cdn>) -> Self {
        UrlResolver {
            registry,
            keys,
            cdn,
        }
    }

    /// Storage-relative location of a rendition.
    pub fn private_url(&self, asset: &Asset, format_name: &str) -> Result<String, UrlError> {
        let descriptor = self
            .registry
            .descriptor(format_name)
            .ok_or_else(|| UrlError::UnknownFormat(format_name.to_string()))?;
        Ok(self.keys.resolve(asset, &descriptor)?)
    }

    /// Publicly servable URL of a rendition.
    pub fn public_url(&self, asset: &Asset, format_name: &str) -> Result<String, UrlError> {
        let relative = self.private_url(asset, format_name)?;
        Ok(self.cdn.path(&relative))
    }

    /// Properties a player template needs: identification, thumbnail,
    /// source URLs per enabled format, dimensions and duration, merged
    /// with the asset's stored player options.
    pub fn helper_properties(&self, asset: &Asset) -> Result<JsonMap<String, JsonValue>, UrlError> {
        let mut properties = JsonMap::new();

        if let Some(JsonValue::Object(options)) = asset.metadata_value("options") {
            for (key, value) in options {
                properties.insert(key.clone(), value.clone());
            }
        }

        properties.insert("id".to_string(), json!(asset.id));
        properties.insert("title".to_string(), json!(asset.name));
        properties.insert(
            "thumbnail".to_string(),
            json!(self.private_url(asset, "admin")?),
        );
        properties.insert("src".to_string(), json!(self.public_url(asset, "reference")?));
        properties.insert("realref".to_string(), json!(asset.reference));
        properties.insert("width".to_string(), json!(asset.width));
        properties.insert("height".to_string(), json!(asset.height));
        properties.insert("duration".to_string(), json!(asset.duration));

        for descriptor in self.registry.removable_formats() {
            properties.insert(
                format!("video_{}", descriptor.extension),
                json!(self.public_url(asset, &descriptor.name)?),
            );
        }

        Ok(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{IdShardGenerator, ReferenceNamer};
    use vidmill_core::{PlayerOptions, TranscodeConfig};

    fn resolver(config: &TranscodeConfig) -> UrlResolver {
        UrlResolver::new(
            FormatRegistry::from_config(config),
            KeyResolver::new(ReferenceNamer::with_salt(42), Arc::new(IdShardGenerator)),
            Arc::new(PassthroughCdn::new("https://cdn.example.com/media/")),
        )
    }

    fn asset() -> Asset {
        let mut asset = Asset::new("My Clip");
        asset.id = Some(5);
        asset.reference = Some("abcdef.mov".to_string());
        asset.width = Some(640);
        asset.height = Some(360);
        asset.duration = Some(12.5);
        asset
    }

    #[test]
    fn private_urls_per_format() {
        let urls = resolver(&TranscodeConfig::default());
        let asset = asset();

        assert_eq!(
            urls.private_url(&asset, "reference").unwrap(),
            "0001/01/abcdef.mov"
        );
        assert_eq!(urls.private_url(&asset, "admin").unwrap(), "0001/01/abcdef.jpg");
        assert_eq!(
            urls.private_url(&asset, "thumb_admin").unwrap(),
            "0001/01/thumb_5_admin.jpg"
        );
        assert_eq!(
            urls.private_url(&asset, "videos_webm").unwrap(),
            "0001/01/videos_webm_5.webm"
        );
    }

    #[test]
    fn public_url_is_cdn_prefixed() {
        let urls = resolver(&TranscodeConfig::default());
        assert_eq!(
            urls.public_url(&asset(), "videos_mp4").unwrap(),
            "https://cdn.example.com/media/0001/01/videos_mp4_5.mp4"
        );
    }

    #[test]
    fn unknown_format_is_an_error() {
        let urls = resolver(&TranscodeConfig::default());
        assert!(matches!(
            urls.private_url(&asset(), "videos_avi"),
            Err(UrlError::UnknownFormat(_))
        ));
    }

    #[test]
    fn missing_id_propagates() {
        let urls = resolver(&TranscodeConfig::default());
        let mut asset = asset();
        asset.id = None;
        assert!(matches!(
            urls.private_url(&asset, "videos_mp4"),
            Err(UrlError::Naming(NamingError::MissingId))
        ));
    }

    #[test]
    fn helper_properties_carry_options_and_urls() {
        let urls = resolver(&TranscodeConfig::default());
        let mut asset = asset();
        asset.set_metadata_value("options", PlayerOptions::default().to_value());

        let props = urls.helper_properties(&asset).unwrap();
        assert_eq!(props["controls"], json!(true));
        assert_eq!(props["title"], json!("My Clip"));
        assert_eq!(props["duration"], json!(12.5));
        assert_eq!(
            props["video_mp4"],
            json!("https://cdn.example.com/media/0001/01/videos_mp4_5.mp4")
        );
        assert!(props.contains_key("video_ogg"));
        assert!(props.contains_key("video_webm"));
    }
}
