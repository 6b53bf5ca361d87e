pub mod asset;
pub mod format;

pub use asset::{Asset, AssetStatus, THUMBNAIL_EXT};
pub use format::{CodecSpec, FormatDescriptor, FormatKind, PlayerOptions};
