//! Vidmill Core Library
//!
//! This crate provides the domain models, configuration, and upload-handle
//! capability shared across all vidmill components.

pub mod config;
pub mod models;
pub mod upload;

// Re-export commonly used types
pub use config::TranscodeConfig;
pub use models::{
    Asset, AssetStatus, CodecSpec, FormatDescriptor, FormatKind, PlayerOptions, THUMBNAIL_EXT,
};
pub use upload::{TempUpload, UploadHandle};
