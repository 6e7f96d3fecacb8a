//! Preview server command.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::Router;
use guidepack_bundle::Bundler;
use tower_http::services::ServeDir;

use crate::config::{load_config, Overrides};

/// Directory holding the build output for the configured guide.
fn output_dir(config_path: &Path) -> Result<PathBuf> {
    let config = load_config(config_path)?.into_bundle_config(Overrides::default())?;
    let output = Bundler::new(config).output_path();

    Ok(output
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Run the serve command.
pub async fn run(config_path: &Path, port: u16, dir: Option<PathBuf>, open: bool) -> Result<()> {
    let dir = match dir {
        Some(dir) => dir,
        None => output_dir(config_path)?,
    };

    if !dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'guidepack build' first.",
            dir.display()
        );
    }

    let addr: SocketAddr = format!("127.0.0.1:{}", port)
        .parse()
        .context("Invalid address")?;

    tracing::info!("Serving {} at http://{}", dir.display(), addr);

    let app = Router::new().fallback_service(ServeDir::new(&dir));

    let listener = tokio::net::TcpListener::bind(addr).await?;

    if open {
        let url = format!("http://{}", addr);
        let _ = open::that(&url);
    }

    axum::serve(listener, app).await?;

    Ok(())
}
