//! Image optimisation command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use guidepack_bundle::{Bundler, OptimizeReport};

use crate::config::{load_config, Overrides};

/// Run the optimize command.
pub async fn run(config_path: &Path, guide: Option<PathBuf>) -> Result<OptimizeReport> {
    tracing::info!("Optimizing images...");

    let config = load_config(config_path)?.into_bundle_config(Overrides {
        guide,
        ..Default::default()
    })?;

    let bundler = Bundler::new(config);
    let report = tokio::task::spawn_blocking(move || bundler.optimize_images()).await?;

    if report.converted + report.up_to_date > 0 {
        tracing::info!("Set `prefer_webp = true` under [build] to embed the WebP versions.");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn converts_guide_images() {
        let temp = tempdir().unwrap();
        let guide = temp.path().join("guide");
        let head = guide.join("images/head");
        fs::create_dir_all(&head).unwrap();
        fs::write(head.join("broken.png"), b"not a png").unwrap();
        fs::write(head.join("notes.txt"), b"skip").unwrap();

        let report = run(&temp.path().join("guidepack.toml"), Some(guide))
            .await
            .unwrap();

        // missing background plus the undecodable avatar
        assert_eq!(report.converted, 0);
        assert_eq!(report.failed, 2);
    }
}
