//! Pipeline orchestrator - drives an asset through its lifecycle.
//!
//! Create runs probe -> reference naming -> store -> thumbnail -> variants
//! -> finalize, strictly sequentially for one asset. Update re-runs the
//! same sequence for a replacement upload and then retires the prior
//! artifacts. Remove deletes everything the asset owns in the store.
//!
//! Concurrent runs for the same asset id are the caller's responsibility
//! to serialize.

use crate::naming::{variant_file_name, KeyResolver, NamingError};
use crate::probe::{FfprobeAdapter, ProbeError, VideoProbe};
use crate::registry::FormatRegistry;
use crate::transcode::{scaled_height, FfmpegEngine, TranscodeEngine, TranscodeError};
use bytes::Bytes;
use serde_json::json;
use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use vidmill_core::{
    Asset, AssetStatus, FormatDescriptor, FormatKind, TranscodeConfig, UploadHandle,
};
use vidmill_storage::{ContentStore, StorageError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("upload missing or empty")]
    UploadMissing,

    #[error("upload rejected: {0}")]
    UploadRejected(String),

    #[error("asset has no id; persist it before running the pipeline")]
    MissingId,

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle position of a running transform, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Pending,
    Probed,
    Stored,
    ThumbnailReady,
    VariantsReady,
    Finalized,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PipelineStage::Pending => write!(f, "pending"),
            PipelineStage::Probed => write!(f, "probed"),
            PipelineStage::Stored => write!(f, "stored"),
            PipelineStage::ThumbnailReady => write!(f, "thumbnail_ready"),
            PipelineStage::VariantsReady => write!(f, "variants_ready"),
            PipelineStage::Finalized => write!(f, "finalized"),
        }
    }
}

/// Per-request knobs supplied alongside an upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformRequest {
    /// Overrides the configured thumbnail capture offset for this run.
    pub capture_offset: Option<f64>,
    /// Player flags to persist on the asset.
    pub player: Option<vidmill_core::PlayerOptions>,
}

/// What one transform produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub reference_key: String,
    pub thumbnail_key: Option<String>,
    pub variants: Vec<VariantOutcome>,
}

/// Result of one variant encode attempt.
#[derive(Debug, Clone)]
pub struct VariantOutcome {
    pub format: String,
    pub key: Option<String>,
    pub error: Option<String>,
}

impl VariantOutcome {
    fn succeeded(format: &str, key: String) -> Self {
        VariantOutcome {
            format: format.to_string(),
            key: Some(key),
            error: None,
        }
    }

    fn failed(format: &str, error: String) -> Self {
        VariantOutcome {
            format: format.to_string(),
            key: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.key.is_some()
    }
}

/// Artifact keys captured once at the start of a removal or replacement,
/// threaded through as a plain value.
#[derive(Debug, Clone)]
struct RemovalSnapshot {
    keys: Vec<String>,
}

pub struct VideoPipeline {
    store: Arc<dyn ContentStore>,
    probe: Arc<dyn VideoProbe>,
    engine: Arc<dyn TranscodeEngine>,
    registry: FormatRegistry,
    keys: KeyResolver,
    config: TranscodeConfig,
}

impl VideoPipeline {
    pub fn new(
        store: Arc<dyn ContentStore>,
        probe: Arc<dyn VideoProbe>,
        engine: Arc<dyn TranscodeEngine>,
        keys: KeyResolver,
        config: TranscodeConfig,
    ) -> Self {
        let registry = FormatRegistry::from_config(&config);
        VideoPipeline {
            store,
            probe,
            engine,
            registry,
            keys,
            config,
        }
    }

    /// Build a pipeline over the real ffmpeg/ffprobe toolchain described by
    /// the configuration.
    pub fn with_tools(
        store: Arc<dyn ContentStore>,
        keys: KeyResolver,
        config: TranscodeConfig,
    ) -> Result<Self, PipelineError> {
        let probe = Arc::new(FfprobeAdapter::new(config.ffprobe_path.clone())?);
        let engine = Arc::new(FfmpegEngine::new(
            config.ffmpeg_path.clone(),
            config.encode_timeout_secs,
            config.encoder_threads,
        )?);
        Ok(Self::new(store, probe, engine, keys, config))
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn keys(&self) -> &KeyResolver {
        &self.keys
    }

    /// Run the create path. With no upload attached the transform does not
    /// run and `None` is returned.
    pub async fn create(
        &self,
        asset: &mut Asset,
        upload: Option<&dyn UploadHandle>,
        request: &TransformRequest,
    ) -> Result<Option<PipelineReport>, PipelineError> {
        let Some(upload) = upload else {
            tracing::debug!(asset = %asset.name, "no upload attached, transform skipped");
            return Ok(None);
        };

        match self.transform(asset, upload, request).await {
            Ok(report) => {
                asset.status = AssetStatus::Ok;
                Ok(Some(report))
            }
            Err(e) => {
                asset.status = AssetStatus::Error;
                tracing::error!(asset = %asset.name, error = %e, "pipeline aborted");
                Err(e)
            }
        }
    }

    /// Run the update path: replace the stored original with a new upload,
    /// then retire the prior artifacts. Cleanup is best-effort; a failed
    /// store delete is logged, never fatal.
    pub async fn update(
        &self,
        asset: &mut Asset,
        upload: Option<&dyn UploadHandle>,
        request: &TransformRequest,
    ) -> Result<Option<PipelineReport>, PipelineError> {
        let Some(upload) = upload else {
            tracing::debug!(asset = %asset.name, "no upload attached, update skipped");
            return Ok(None);
        };

        let previous = if asset.reference.is_some() {
            Some(self.snapshot(asset)?)
        } else {
            None
        };
        asset.previous_reference = asset.reference.take();

        let report = match self.transform(asset, upload, request).await {
            Ok(report) => report,
            Err(e) => {
                asset.status = AssetStatus::Error;
                tracing::error!(asset = %asset.name, error = %e, "update pipeline aborted");
                return Err(e);
            }
        };
        asset.status = AssetStatus::Ok;

        if let Some(previous) = previous {
            let mut keep: HashSet<&str> = HashSet::new();
            keep.insert(report.reference_key.as_str());
            if let Some(thumbnail) = report.thumbnail_key.as_deref() {
                keep.insert(thumbnail);
            }
            for outcome in &report.variants {
                if let Some(key) = outcome.key.as_deref() {
                    keep.insert(key);
                }
            }
            self.delete_snapshot(&previous, &keep).await;
        }
        asset.previous_reference = None;

        Ok(Some(report))
    }

    /// Run the remove path: delete the reference artifact, the thumbnails,
    /// and every variant that may exist. Deletes are best-effort.
    pub async fn remove(&self, asset: &Asset) -> Result<(), PipelineError> {
        if asset.reference.is_none() {
            return Ok(());
        }

        let snapshot = self.snapshot(asset)?;
        self.delete_snapshot(&snapshot, &HashSet::new()).await;
        Ok(())
    }

    /// Refresh probed metadata from the stored reference artifact.
    pub async fn update_metadata(&self, asset: &mut Asset) -> Result<(), PipelineError> {
        let reference_key = self.keys.reference_key(asset)?;
        let data = self.store.read(&reference_key).await?;
        asset.size = Some(data.len() as u64);

        let scratch = tempfile::Builder::new()
            .suffix(&format!(".{}", asset.extension()))
            .tempfile()?;
        tokio::fs::write(scratch.path(), &data).await?;

        let info = self.probe.probe(scratch.path()).await?;
        asset.width = Some(info.width);
        asset.height = Some(info.height);
        asset.duration = Some(info.duration);
        if let Some(bitrate) = info.bitrate {
            asset.set_metadata_value("bitrate", json!(bitrate));
        }

        Ok(())
    }

    /// The full create/update transform sequence.
    async fn transform(
        &self,
        asset: &mut Asset,
        upload: &dyn UploadHandle,
        request: &TransformRequest,
    ) -> Result<PipelineReport, PipelineError> {
        self.validate_upload(upload)?;
        let id = asset.id.ok_or(PipelineError::MissingId)?;

        let info = self.probe.probe(upload.real_path()).await?;
        asset.content_type = Some(upload.mime_type().to_string());
        asset.size = Some(upload.byte_size());
        asset.width = Some(info.width);
        asset.height = Some(info.height);
        asset.duration = Some(info.duration);
        asset.set_metadata_value("filename", json!(upload.original_client_name()));
        if let Some(bitrate) = info.bitrate {
            asset.set_metadata_value("bitrate", json!(bitrate));
        }
        self.trace_stage(id, PipelineStage::Probed);

        if asset.reference.is_none() {
            let extension = upload_extension(upload);
            asset.reference = Some(self.keys.namer().generate(&asset.name, &extension));
        }

        let reference_key = self.keys.reference_key(asset)?;
        let raw = tokio::fs::read(upload.real_path()).await?;
        self.store.write(&reference_key, Bytes::from(raw)).await?;
        self.trace_stage(id, PipelineStage::Stored);

        let offset = capture_offset(
            request.capture_offset,
            self.config.image_frame_offset_secs,
            info.duration,
        );
        let thumbnail_key = match self.engine.extract_frame(upload.real_path(), offset).await {
            Ok(frame) => {
                let key = self.keys.thumbnail_key(asset)?;
                self.store.write(&key, frame).await?;
                Some(key)
            }
            Err(e) => {
                tracing::warn!(
                    asset_id = id,
                    error = %e,
                    "thumbnail extraction failed, continuing without thumbnail"
                );
                None
            }
        };
        self.trace_stage(id, PipelineStage::ThumbnailReady);

        let variants = self
            .generate_variants(asset, upload.real_path(), &reference_key, &info)
            .await?;
        self.trace_stage(id, PipelineStage::VariantsReady);

        let player = request.player.unwrap_or_default();
        asset.set_metadata_value("options", player.to_value());

        self.trace_stage(id, PipelineStage::Finalized);

        Ok(PipelineReport {
            reference_key,
            thumbnail_key,
            variants,
        })
    }

    /// Encode every enabled delivery format. Encode failures are isolated
    /// per variant; storage failures abort the transform.
    async fn generate_variants(
        &self,
        asset: &mut Asset,
        source: &Path,
        reference_key: &str,
        info: &crate::probe::StreamInfo,
    ) -> Result<Vec<VariantOutcome>, PipelineError> {
        let enabled = self.registry.enabled_formats().to_vec();
        let mut outcomes = Vec::new();

        if enabled.is_empty() {
            // No conversion format configured: duplicate the original under
            // the default delivery name so a playable asset always exists.
            let fallback = self.registry.fallback_format();
            let key = self.keys.variant_key(asset, &fallback)?;
            self.store.copy(reference_key, &key).await?;
            self.record_variant_success(asset, &fallback);
            outcomes.push(VariantOutcome::succeeded(&fallback.name, key));
            return Ok(outcomes);
        }

        let (width, height) = match scaled_height(self.config.video_width, info.width, info.height)
        {
            Ok(height) => (self.config.video_width, height),
            Err(e) => {
                tracing::warn!(error = %e, "variant generation aborted, reference stays valid");
                for descriptor in &enabled {
                    self.record_variant_failure(asset, descriptor);
                    outcomes.push(VariantOutcome::failed(&descriptor.name, e.to_string()));
                }
                return Ok(outcomes);
            }
        };

        for descriptor in &enabled {
            let FormatKind::Delivery(codec) = descriptor.kind else {
                continue;
            };

            match self.engine.encode_variant(source, width, height, codec).await {
                Ok(data) => {
                    let key = self.keys.variant_key(asset, descriptor)?;
                    self.store.write(&key, data).await?;
                    self.record_variant_success(asset, descriptor);
                    outcomes.push(VariantOutcome::succeeded(&descriptor.name, key));
                }
                Err(e) => {
                    tracing::warn!(
                        format = %descriptor.name,
                        error = %e,
                        "variant encode failed, continuing with remaining formats"
                    );
                    self.record_variant_failure(asset, descriptor);
                    outcomes.push(VariantOutcome::failed(&descriptor.name, e.to_string()));
                }
            }
        }

        Ok(outcomes)
    }

    fn record_variant_success(&self, asset: &mut Asset, descriptor: &FormatDescriptor) {
        if let Some(key) = descriptor.availability_key() {
            asset.set_metadata_value(key, json!(true));
        }
        if let (Some(key), Some(id)) = (descriptor.filename_key(), asset.id) {
            asset.set_metadata_value(key, json!(variant_file_name(descriptor, id)));
        }
    }

    fn record_variant_failure(&self, asset: &mut Asset, descriptor: &FormatDescriptor) {
        if let Some(key) = descriptor.availability_key() {
            asset.set_metadata_value(key, json!(false));
        }
    }

    /// All keys an asset may own in the store, captured as one value.
    fn snapshot(&self, asset: &Asset) -> Result<RemovalSnapshot, NamingError> {
        let mut keys = vec![
            self.keys.reference_key(asset)?,
            self.keys.thumbnail_key(asset)?,
            self.keys.thumb_admin_key(asset)?,
        ];
        for descriptor in self.registry.removable_formats() {
            keys.push(self.keys.variant_key(asset, &descriptor)?);
        }
        Ok(RemovalSnapshot { keys })
    }

    /// Delete snapshot keys not present in `keep`. Failures are logged and
    /// skipped; cleanup never aborts the lifecycle.
    async fn delete_snapshot(&self, snapshot: &RemovalSnapshot, keep: &HashSet<&str>) {
        for key in &snapshot.keys {
            if keep.contains(key.as_str()) {
                continue;
            }
            if let Err(e) = self.store.delete(key).await {
                tracing::warn!(key = %key, error = %e, "artifact cleanup failed, skipping");
            }
        }
    }

    fn validate_upload(&self, upload: &dyn UploadHandle) -> Result<(), PipelineError> {
        if upload.byte_size() == 0 {
            return Err(PipelineError::UploadMissing);
        }

        let extension = upload_extension(upload);
        if !self.config.allowed_extensions.is_empty()
            && !self.config.allowed_extensions.iter().any(|e| *e == extension)
        {
            return Err(PipelineError::UploadRejected(format!(
                "extension {} not allowed",
                extension
            )));
        }

        let content_type = upload.mime_type().to_lowercase();
        if !self.config.allowed_content_types.is_empty()
            && !self
                .config
                .allowed_content_types
                .iter()
                .any(|c| *c == content_type)
        {
            return Err(PipelineError::UploadRejected(format!(
                "content type {} not allowed",
                content_type
            )));
        }

        Ok(())
    }

    fn trace_stage(&self, asset_id: i64, stage: PipelineStage) {
        tracing::debug!(asset_id, stage = %stage, "pipeline stage reached");
    }
}

/// Thumbnail timestamp: the per-request override when present, otherwise
/// the configured default, clamped to half the duration when it points
/// past the end of the video.
fn capture_offset(requested: Option<f64>, default_secs: u32, duration: f64) -> f64 {
    let offset = requested.unwrap_or(f64::from(default_secs));
    if offset > duration {
        duration / 2.0
    } else {
        offset
    }
}

/// Extension guessed from the client file name, `mp4` when unusable.
fn upload_extension(upload: &dyn UploadHandle) -> String {
    let ext = upload
        .original_client_name()
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if ext.len() < 2 {
        "mp4".to_string()
    } else {
        ext
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidmill_core::TempUpload;

    #[test]
    fn capture_offset_clamps_past_the_end() {
        assert_eq!(capture_offset(None, 10, 5.0), 2.5);
        assert_eq!(capture_offset(Some(30.0), 10, 8.0), 4.0);
    }

    #[test]
    fn capture_offset_within_duration_is_kept() {
        assert_eq!(capture_offset(None, 10, 60.0), 10.0);
        assert_eq!(capture_offset(Some(3.5), 10, 60.0), 3.5);
        // Equal to the duration is still inside the video.
        assert_eq!(capture_offset(Some(5.0), 10, 5.0), 5.0);
    }

    #[test]
    fn upload_extension_from_client_name() {
        let upload = TempUpload::with_attributes("/tmp/u", "video/quicktime", 10, "Clip.MOV");
        assert_eq!(upload_extension(&upload), "mov");

        let upload = TempUpload::with_attributes("/tmp/u", "video/mp4", 10, "noext");
        assert_eq!(upload_extension(&upload), "mp4");

        let upload = TempUpload::with_attributes("/tmp/u", "video/mp4", 10, "short.x");
        assert_eq!(upload_extension(&upload), "mp4");
    }

    #[test]
    fn stage_display() {
        assert_eq!(PipelineStage::Pending.to_string(), "pending");
        assert_eq!(PipelineStage::ThumbnailReady.to_string(), "thumbnail_ready");
        assert_eq!(PipelineStage::Finalized.to_string(), "finalized");
    }
}
