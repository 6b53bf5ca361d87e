//! Reference naming and storage key resolution.
//!
//! All storage keys flow through this module: the store itself never
//! composes keys, and no other component builds path strings by hand.

use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use vidmill_core::{Asset, FormatDescriptor, FormatKind, THUMBNAIL_EXT};

/// Salt space floor; combined with the hash this makes concurrent
/// creations collision-resistant.
const SALT_MIN: u32 = 10_000;
const SALT_MAX: u32 = 100_000_000;

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("asset has no id; persist it before resolving keys")]
    MissingId,

    #[error("asset has no reference name assigned")]
    MissingReference,
}

/// Collision-resistant naming of the stored original.
///
/// The name is a SHA-256 digest over the display name and a random salt,
/// suffixed with the source extension. A fixed salt can be injected for
/// deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct ReferenceNamer {
    salt: Option<u32>,
}

impl ReferenceNamer {
    pub fn new() -> Self {
        ReferenceNamer { salt: None }
    }

    /// Use a fixed salt instead of a random one.
    pub fn with_salt(salt: u32) -> Self {
        ReferenceNamer { salt: Some(salt) }
    }

    pub fn generate(&self, display_name: &str, extension: &str) -> String {
        let salt = self
            .salt
            .unwrap_or_else(|| rand::rng().random_range(SALT_MIN..SALT_MAX));

        let mut hasher = Sha256::new();
        hasher.update(display_name.as_bytes());
        hasher.update(salt.to_string().as_bytes());
        let digest = hasher.finalize();

        format!("{}.{}", hex::encode(digest), extension)
    }
}

/// Storage directory strategy for an asset. Sharding by id, date, or
/// anything else the deployment wants; injected, not hardcoded.
pub trait PathGenerator: Send + Sync {
    fn generate(&self, asset_id: i64) -> String;
}

/// Two-level shard of the numeric id, keeping directories small.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdShardGenerator;

impl PathGenerator for IdShardGenerator {
    fn generate(&self, asset_id: i64) -> String {
        let first = asset_id / 100_000 + 1;
        let second = (asset_id % 100_000) / 1_000 + 1;
        format!("{:04}/{:02}", first, second)
    }
}

/// Maps an asset and a format to its storage key.
#[derive(Clone)]
pub struct KeyResolver {
    namer: ReferenceNamer,
    paths: std::sync::Arc<dyn PathGenerator>,
}

impl KeyResolver {
    pub fn new(namer: ReferenceNamer, paths: std::sync::Arc<dyn PathGenerator>) -> Self {
        KeyResolver { namer, paths }
    }

    pub fn namer(&self) -> &ReferenceNamer {
        &self.namer
    }

    pub fn path(&self, asset: &Asset) -> Result<String, NamingError> {
        let id = asset.id.ok_or(NamingError::MissingId)?;
        Ok(self.paths.generate(id))
    }

    /// Key of the stored original.
    pub fn reference_key(&self, asset: &Asset) -> Result<String, NamingError> {
        let reference = asset.reference.as_deref().ok_or(NamingError::MissingReference)?;
        Ok(format!("{}/{}", self.path(asset)?, reference))
    }

    /// Key of the extracted thumbnail: the reference key with the
    /// extension swapped.
    pub fn thumbnail_key(&self, asset: &Asset) -> Result<String, NamingError> {
        let reference = asset.reference.as_deref().ok_or(NamingError::MissingReference)?;
        let stem = reference
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(reference);
        Ok(format!("{}/{}.{}", self.path(asset)?, stem, THUMBNAIL_EXT))
    }

    /// Key of the admin-panel thumbnail rendition.
    pub fn thumb_admin_key(&self, asset: &Asset) -> Result<String, NamingError> {
        let id = asset.id.ok_or(NamingError::MissingId)?;
        Ok(format!(
            "{}/thumb_{}_admin.{}",
            self.path(asset)?,
            id,
            THUMBNAIL_EXT
        ))
    }

    /// Key of one delivery variant.
    pub fn variant_key(
        &self,
        asset: &Asset,
        descriptor: &FormatDescriptor,
    ) -> Result<String, NamingError> {
        let id = asset.id.ok_or(NamingError::MissingId)?;
        Ok(format!(
            "{}/{}",
            self.path(asset)?,
            variant_file_name(descriptor, id)
        ))
    }

    /// Resolve any format kind to its storage key.
    pub fn resolve(
        &self,
        asset: &Asset,
        descriptor: &FormatDescriptor,
    ) -> Result<String, NamingError> {
        match descriptor.kind {
            FormatKind::Reference => self.reference_key(asset),
            FormatKind::Admin => self.thumbnail_key(asset),
            FormatKind::ThumbAdmin => self.thumb_admin_key(asset),
            FormatKind::Delivery(_) => self.variant_key(asset, descriptor),
        }
    }
}

/// File name (without directory) of a delivery variant,
/// e.g. `videos_mp4_42.mp4`.
pub fn variant_file_name(descriptor: &FormatDescriptor, asset_id: i64) -> String {
    format!("{}_{}.{}", descriptor.name, asset_id, descriptor.extension)
}
