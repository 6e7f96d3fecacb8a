//! Configuration file (guidepack.toml).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use guidepack_bundle::{BundleConfig, CssOptimizer};
use serde::Deserialize;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub guide: GuideConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub build: BuildSettings,
}

#[derive(Debug, Deserialize)]
pub struct GuideConfig {
    #[serde(default = "default_guide_dir")]
    pub dir: String,
    /// Page to bundle; first *.html when unset
    pub html: Option<String>,
    #[serde(default = "default_css")]
    pub css: String,
    #[serde(default = "default_js")]
    pub js: String,
    #[serde(default = "default_csv")]
    pub csv: String,
    #[serde(default = "default_head_dir")]
    pub head_dir: String,
    #[serde(default = "default_background")]
    pub background: String,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            dir: default_guide_dir(),
            html: None,
            css: default_css(),
            js: default_js(),
            csv: default_csv(),
            head_dir: default_head_dir(),
            background: default_background(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    /// Output file; `<project root>/docs/index.html` when unset
    pub file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BuildSettings {
    #[serde(default = "default_minify")]
    pub minify: bool,
    #[serde(default = "default_css_optimizer")]
    pub css_optimizer: String,
    /// Embed `.webp` siblings written by `guidepack optimize`
    #[serde(default)]
    pub prefer_webp: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            minify: default_minify(),
            css_optimizer: default_css_optimizer(),
            prefer_webp: false,
        }
    }
}

fn default_guide_dir() -> String {
    ".".to_string()
}
fn default_css() -> String {
    "css/css.css".to_string()
}
fn default_js() -> String {
    "js/app.js".to_string()
}
fn default_csv() -> String {
    "data.inline.csv".to_string()
}
fn default_head_dir() -> String {
    "images/head".to_string()
}
fn default_background() -> String {
    "images/chart_back8_1.png".to_string()
}
fn default_minify() -> bool {
    true
}
fn default_css_optimizer() -> String {
    "lexical".to_string()
}

/// Overrides given on the command line.
#[derive(Debug, Default)]
pub struct Overrides {
    pub guide: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub minify: Option<bool>,
    pub prefer_webp: Option<bool>,
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No {} found, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

impl ConfigFile {
    /// Turn the file settings plus command-line overrides into bundle settings.
    pub fn into_bundle_config(self, overrides: Overrides) -> Result<BundleConfig> {
        let css_optimizer: CssOptimizer = self.build.css_optimizer.parse()?;

        Ok(BundleConfig {
            guide_dir: overrides
                .guide
                .unwrap_or_else(|| PathBuf::from(&self.guide.dir)),
            html: self.guide.html.map(PathBuf::from),
            css: PathBuf::from(self.guide.css),
            js: PathBuf::from(self.guide.js),
            csv: PathBuf::from(self.guide.csv),
            head_dir: PathBuf::from(self.guide.head_dir),
            background: PathBuf::from(self.guide.background),
            output: overrides.output.or(self.output.file.map(PathBuf::from)),
            minify: overrides.minify.unwrap_or(self.build.minify),
            css_optimizer,
            prefer_webp: overrides.prefer_webp.unwrap_or(self.build.prefer_webp),
        })
    }
}
