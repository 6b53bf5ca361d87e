//! Vidmill worker: runs the transform pipeline over a local file.
//!
//! Configuration comes from VIDMILL_* environment variables (see
//! `TranscodeConfig`); artifacts land under the storage root.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use vidmill_core::{Asset, TempUpload, TranscodeConfig};
use vidmill_processing::{
    IdShardGenerator, KeyResolver, ReferenceNamer, TransformRequest, VideoPipeline,
};
use vidmill_storage::{create_store, StoreBackend};

#[derive(Parser)]
#[command(name = "vidmill", about = "Transform a video file into a stored media asset")]
struct Cli {
    /// Path to the source video
    file: PathBuf,

    /// Asset id used for storage key generation
    #[arg(long, default_value = "1")]
    id: i64,

    /// Display name of the asset; defaults to the file name
    #[arg(long)]
    name: Option<String>,

    /// Root directory for stored artifacts
    #[arg(long, default_value = "./media")]
    storage_root: PathBuf,

    /// MIME type of the source
    #[arg(long, default_value = "video/mp4")]
    content_type: String,

    /// Thumbnail capture offset in seconds, overriding the configured default
    #[arg(long)]
    capture_offset: Option<f64>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = TranscodeConfig::from_env().context("invalid configuration")?;

    let store = create_store(StoreBackend::Local {
        base_path: cli.storage_root.clone(),
    })
    .await
    .context("failed to open storage root")?;

    let keys = KeyResolver::new(ReferenceNamer::new(), Arc::new(IdShardGenerator));
    let pipeline =
        VideoPipeline::with_tools(store, keys, config).context("failed to build pipeline")?;

    let name = cli.name.clone().unwrap_or_else(|| {
        cli.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string())
    });

    let mut asset = Asset::new(name);
    asset.id = Some(cli.id);

    let upload =
        TempUpload::open(&cli.file, &cli.content_type).context("failed to open source file")?;

    let request = TransformRequest {
        capture_offset: cli.capture_offset,
        player: None,
    };

    let report = pipeline
        .create(&mut asset, Some(&upload), &request)
        .await?
        .context("pipeline did not run")?;

    println!("status: {}", asset.status);
    println!("reference: {}", report.reference_key);
    match &report.thumbnail_key {
        Some(key) => println!("thumbnail: {}", key),
        None => println!("thumbnail: (not generated)"),
    }
    for variant in &report.variants {
        match (&variant.key, &variant.error) {
            (Some(key), _) => println!("{}: {}", variant.format, key),
            (None, Some(error)) => println!("{}: failed ({})", variant.format, error),
            (None, None) => {}
        }
    }

    Ok(())
}
