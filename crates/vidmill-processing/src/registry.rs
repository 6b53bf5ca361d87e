//! Format registry - which renditions are active for this deployment.

use vidmill_core::{CodecSpec, FormatDescriptor, TranscodeConfig};

/// Declares the active delivery formats plus the fixed non-delivery
/// renditions. Built once from configuration; immutable afterwards.
///
/// Delivery formats keep a total order (mp4, ogg, webm) so encode
/// sequencing is deterministic.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    delivery: Vec<FormatDescriptor>,
    fixed: Vec<FormatDescriptor>,
}

impl FormatRegistry {
    pub fn from_config(config: &TranscodeConfig) -> Self {
        let mut delivery = Vec::new();
        if config.format_mp4 {
            delivery.push(FormatDescriptor::delivery(CodecSpec::H264));
        }
        if config.format_ogg {
            delivery.push(FormatDescriptor::delivery(CodecSpec::Theora));
        }
        if config.format_webm {
            delivery.push(FormatDescriptor::delivery(CodecSpec::Vp8));
        }

        FormatRegistry {
            delivery,
            fixed: vec![
                FormatDescriptor::reference(),
                FormatDescriptor::admin(),
                FormatDescriptor::thumb_admin(),
            ],
        }
    }

    /// Enabled delivery formats, in encode order.
    pub fn enabled_formats(&self) -> &[FormatDescriptor] {
        &self.delivery
    }

    /// The delivery format used when no encode format is enabled: the
    /// original is copied under the default mp4 label so a playable asset
    /// always exists.
    pub fn fallback_format(&self) -> FormatDescriptor {
        FormatDescriptor::delivery(CodecSpec::H264)
    }

    /// Delivery formats whose artifacts may exist in the store and must be
    /// considered during update cleanup and removal.
    pub fn removable_formats(&self) -> Vec<FormatDescriptor> {
        if self.delivery.is_empty() {
            vec![self.fallback_format()]
        } else {
            self.delivery.clone()
        }
    }

    /// Look up any resolvable format by name, delivery or fixed.
    pub fn descriptor(&self, name: &str) -> Option<FormatDescriptor> {
        self.fixed
            .iter()
            .chain(self.delivery.iter())
            .find(|d| d.name == name)
            .cloned()
            .or_else(|| {
                // With no formats enabled the fallback artifact still exists
                // and stays resolvable under its default name.
                let fallback = self.fallback_format();
                (self.delivery.is_empty() && fallback.name == name).then_some(fallback)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidmill_core::FormatKind;

    fn config(mp4: bool, ogg: bool, webm: bool) -> TranscodeConfig {
        TranscodeConfig {
            format_mp4: mp4,
            format_ogg: ogg,
            format_webm: webm,
            ..TranscodeConfig::default()
        }
    }

    #[test]
    fn encode_order_is_total_and_deterministic() {
        let registry = FormatRegistry::from_config(&config(true, true, true));
        let names: Vec<&str> = registry
            .enabled_formats()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["videos_mp4", "videos_ogg", "videos_webm"]);
    }

    #[test]
    fn disabled_flags_drop_formats() {
        let registry = FormatRegistry::from_config(&config(false, true, false));
        let names: Vec<&str> = registry
            .enabled_formats()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["videos_ogg"]);
    }

    #[test]
    fn no_formats_falls_back_to_mp4() {
        let registry = FormatRegistry::from_config(&config(false, false, false));
        assert!(registry.enabled_formats().is_empty());

        let fallback = registry.fallback_format();
        assert_eq!(fallback.name, "videos_mp4");
        assert_eq!(registry.removable_formats(), vec![fallback.clone()]);
        // Still resolvable by name even though no encode runs.
        assert_eq!(registry.descriptor("videos_mp4"), Some(fallback));
    }

    #[test]
    fn fixed_formats_always_resolvable() {
        let registry = FormatRegistry::from_config(&config(true, false, false));

        let reference = registry.descriptor("reference").unwrap();
        assert_eq!(reference.kind, FormatKind::Reference);
        assert!(registry.descriptor("admin").is_some());
        assert!(registry.descriptor("thumb_admin").is_some());
    }

    #[test]
    fn disabled_delivery_is_not_resolvable() {
        let registry = FormatRegistry::from_config(&config(true, false, false));
        assert!(registry.descriptor("videos_mp4").is_some());
        assert!(registry.descriptor("videos_ogg").is_none());
        assert!(registry.descriptor("bogus").is_none());
    }
}
