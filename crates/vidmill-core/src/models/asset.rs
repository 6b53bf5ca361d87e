use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Extension used for extracted thumbnail frames.
pub const THUMBNAIL_EXT: &str = "jpg";

/// Extension assumed when an asset has none or an unusable one.
const DEFAULT_EXT: &str = "mp4";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Pending,
    Ok,
    Error,
}

impl Display for AssetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AssetStatus::Pending => write!(f, "pending"),
            AssetStatus::Ok => write!(f, "ok"),
            AssetStatus::Error => write!(f, "error"),
        }
    }
}

/// The media record driven through the transformation pipeline.
///
/// The owning entity is persisted by an external ORM; `id` stays `None`
/// until that happens. `reference` is the file name of the stored original,
/// assigned once by the pipeline and stable thereafter unless the upload is
/// replaced. `previous_reference` is only populated during an update so the
/// retired artifacts can be cleaned up afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Option<i64>,
    pub name: String,
    pub reference: Option<String>,
    pub previous_reference: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Duration in seconds, fractional.
    pub duration: Option<f64>,
    /// Namespaced metadata map. Stages merge single keys, never the whole map.
    pub metadata: JsonMap<String, JsonValue>,
    pub status: AssetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Asset {
            id: None,
            name: name.into(),
            reference: None,
            previous_reference: None,
            content_type: None,
            size: None,
            width: None,
            height: None,
            duration: None,
            metadata: JsonMap::new(),
            status: AssetStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a single metadata key, leaving the rest of the map untouched.
    pub fn set_metadata_value(&mut self, key: impl Into<String>, value: JsonValue) {
        self.metadata.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn metadata_value(&self, key: &str) -> Option<&JsonValue> {
        self.metadata.get(key)
    }

    /// File extension of the stored original, falling back to `mp4` when the
    /// reference has none or one too short to be usable.
    pub fn extension(&self) -> &str {
        let ext = self
            .reference
            .as_deref()
            .and_then(|r| r.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .unwrap_or(DEFAULT_EXT);
        if ext.len() < 2 {
            DEFAULT_EXT
        } else {
            ext
        }
    }
}
