//! Write a default configuration file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing guidepack...");

    if config_path.exists() && !yes {
        tracing::warn!(
            "{} already exists. Use --yes to overwrite.",
            config_path.display()
        );
        return Ok(());
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    fs::write(config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    tracing::info!("Created {}", config_path.display());
    tracing::info!("Run 'guidepack build' to bundle the guide.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# guidepack configuration

[guide]
# Guide source directory
dir = "."

# Page to bundle (defaults to the first *.html in the guide directory)
# html = "index.html"

# Sources, relative to the guide directory
css = "css/css.css"
js = "js/app.js"
csv = "data.inline.csv"
head_dir = "images/head"
background = "images/chart_back8_1.png"

[output]
# Output file (defaults to <project root>/docs/index.html)
# file = "docs/index.html"

[build]
# Minify CSS and HTML
minify = true

# CSS minifier: "lexical" or "lightningcss"
css_optimizer = "lexical"

# Embed WebP versions written by 'guidepack optimize' when present
prefer_webp = false
"#;
