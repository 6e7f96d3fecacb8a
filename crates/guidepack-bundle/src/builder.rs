//! Single-file guide bundler.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use crate::assets::{inline_css_urls, minify_css, optimize_css};
use crate::html::{inline_assets, minify_html};
use crate::images::{build_image_map, extract_avatar_names};
use crate::optimize::{optimize_images, OptimizeReport};
use crate::root::find_project_root;
use crate::script::patch_script;

/// Which minifier to run over the inlined stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CssOptimizer {
    /// Comment stripping and whitespace collapsing
    #[default]
    Lexical,
    /// Full parse and reprint through lightningcss
    Lightningcss,
}

impl std::str::FromStr for CssOptimizer {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lexical" => Ok(Self::Lexical),
            "lightningcss" => Ok(Self::Lightningcss),
            other => Err(BundleError::ConfigError(format!(
                "unknown CSS optimizer '{}' (expected 'lexical' or 'lightningcss')",
                other
            ))),
        }
    }
}

/// Configuration for bundling a guide.
///
/// Every path except `guide_dir` and `output` is relative to `guide_dir`.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Guide source directory
    pub guide_dir: PathBuf,

    /// Page to bundle (defaults to the first `*.html` in the guide directory)
    pub html: Option<PathBuf>,

    /// Stylesheet, also the `href` of the `<link>` to replace
    pub css: PathBuf,

    /// Script, also the `src` of the `<script>` to replace
    pub js: PathBuf,

    /// CSV listing avatar images in its `Avatar` column
    pub csv: PathBuf,

    /// Directory holding avatar images
    pub head_dir: PathBuf,

    /// Background image added to the inline map
    pub background: PathBuf,

    /// Output file (defaults to `<project root>/docs/index.html`)
    pub output: Option<PathBuf>,

    /// Minify CSS and HTML output
    pub minify: bool,

    /// Minifier used for CSS when `minify` is set
    pub css_optimizer: CssOptimizer,

    /// Embed the `.webp` sibling of an image when one exists
    pub prefer_webp: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            guide_dir: PathBuf::from("."),
            html: None,
            css: PathBuf::from("css/css.css"),
            js: PathBuf::from("js/app.js"),
            csv: PathBuf::from("data.inline.csv"),
            head_dir: PathBuf::from("images/head"),
            background: PathBuf::from("images/chart_back8_1.png"),
            output: None,
            minify: true,
            css_optimizer: CssOptimizer::default(),
            prefer_webp: false,
        }
    }
}

/// A bundled page held in memory.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Final HTML document
    pub html: String,

    /// Number of images embedded in the inline map
    pub images: usize,

    /// Whether the stylesheet link was replaced
    pub css_inlined: bool,

    /// Whether the script tag was replaced
    pub js_inlined: bool,
}

/// Result of a bundle operation.
#[derive(Debug)]
pub struct BundleResult {
    /// Written file
    pub output_path: PathBuf,

    /// Size of the written file in bytes
    pub bytes: usize,

    /// Number of images embedded in the inline map
    pub images: usize,

    /// Total bundle time in milliseconds
    pub duration_ms: u64,
}

/// Errors that can occur while bundling.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("No HTML file found in guide directory: {0}")]
    NoHtml(String),

    #[error("{0} block not found in script")]
    MissingAnchor(String),

    #[error("Failed to parse CSV: {path}: {message}")]
    CsvError { path: String, message: String },

    #[error("Failed to process CSS: {0}")]
    CssError(String),

    #[error("Image conversion failed: {0}")]
    ImageError(String),

    #[error("Failed to serialize image map: {0}")]
    JsonError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Failed to write output: {0}")]
    WriteError(String),
}

/// Bundles a guide into one self-contained HTML file.
#[derive(Debug, Clone)]
pub struct Bundler {
    config: BundleConfig,
}

impl Bundler {
    /// Create a new bundler.
    pub fn new(config: BundleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    /// Where the bundle will be written.
    pub fn output_path(&self) -> PathBuf {
        match &self.config.output {
            Some(path) => path.clone(),
            None => find_project_root(&self.config.guide_dir)
                .join("docs")
                .join("index.html"),
        }
    }

    /// Bundle the guide and write it to [`Bundler::output_path`].
    pub fn bundle(&self) -> Result<BundleResult, BundleError> {
        let start = Instant::now();

        let rendered = self.render()?;
        let output_path = self.output_path();

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| BundleError::WriteError(e.to_string()))?;
        }

        fs::write(&output_path, &rendered.html).map_err(|e| {
            BundleError::WriteError(format!("{}: {}", output_path.display(), e))
        })?;

        tracing::info!("Wrote {}", output_path.display());

        Ok(BundleResult {
            output_path,
            bytes: rendered.html.len(),
            images: rendered.images,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run the whole pipeline in memory.
    pub fn render(&self) -> Result<Rendered, BundleError> {
        let guide = &self.config.guide_dir;

        let html_path = self.html_path()?;
        tracing::debug!("Bundling page {}", html_path.display());
        let html = read_text(&html_path)?;

        let css_path = guide.join(&self.config.css);
        let css = inline_css_urls(&read_text(&css_path)?, &css_path)?;
        let css = if !self.config.minify {
            css
        } else {
            match self.config.css_optimizer {
                CssOptimizer::Lexical => minify_css(&css),
                CssOptimizer::Lightningcss => optimize_css(&css)?,
            }
        };

        let avatars = extract_avatar_names(&guide.join(&self.config.csv))?;
        let images = build_image_map(
            &guide.join(&self.config.head_dir),
            Some(&guide.join(&self.config.background)),
            &avatars,
            self.config.prefer_webp,
        )?;
        tracing::info!("Embedded {} images", images.len());

        let js = patch_script(&read_text(&guide.join(&self.config.js))?, &images)?;

        let css_href = href(&self.config.css);
        let js_src = href(&self.config.js);
        let inlined = inline_assets(&html, &css_href, &css, &js_src, &js);

        if !inlined.css_inlined {
            tracing::warn!("No <link> referencing {} found; stylesheet not inlined", css_href);
        }
        if !inlined.js_inlined {
            tracing::warn!("No <script> referencing {} found; script not inlined", js_src);
        }

        let html = if self.config.minify {
            minify_html(&inlined.html)
        } else {
            inlined.html
        };

        Ok(Rendered {
            html,
            images: images.len(),
            css_inlined: inlined.css_inlined,
            js_inlined: inlined.js_inlined,
        })
    }

    /// Write `.webp` siblings for the background and the avatar directory.
    pub fn optimize_images(&self) -> OptimizeReport {
        let guide = &self.config.guide_dir;
        let report = optimize_images(
            &guide.join(&self.config.head_dir),
            &[guide.join(&self.config.background)],
        );

        tracing::info!(
            "Converted {} images to WebP ({} up to date, {} skipped)",
            report.converted,
            report.up_to_date,
            report.failed
        );

        report
    }

    /// Resolve the page to bundle.
    fn html_path(&self) -> Result<PathBuf, BundleError> {
        if let Some(ref html) = self.config.html {
            return Ok(self.config.guide_dir.join(html));
        }

        WalkDir::new(&self.config.guide_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .find(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "html"))
            .ok_or_else(|| BundleError::NoHtml(self.config.guide_dir.display().to_string()))
    }
}

/// Read a UTF-8 text file.
fn read_text(path: &Path) -> Result<String, BundleError> {
    fs::read_to_string(path).map_err(|e| BundleError::ReadError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Render a relative path the way it appears in an HTML attribute.
fn href(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
