//! Bundle build command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use guidepack_bundle::Bundler;

use crate::config::{load_config, Overrides};

/// Run the build command.
pub async fn run(
    config_path: &Path,
    guide: Option<PathBuf>,
    output: Option<PathBuf>,
    minify: Option<bool>,
    optimize: bool,
) -> Result<()> {
    tracing::info!("Bundling guide...");

    let config = load_config(config_path)?.into_bundle_config(Overrides {
        guide,
        output,
        minify,
        prefer_webp: optimize.then_some(true),
    })?;

    let bundler = Bundler::new(config);
    if optimize {
        bundler.optimize_images();
    }

    let result = bundler.bundle()?;

    tracing::info!(
        "Bundled {} images into {} bytes in {}ms",
        result.images,
        result.bytes,
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_path.display());

    Ok(())
}
