//! Asset pipeline for data URIs and stylesheet processing.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use base64::Engine as _;
use regex::Regex;

use crate::builder::BundleError;

static CSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"url\(([^)]+)\)").expect("valid url() pattern"));
static CSS_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid comment pattern"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([{}:;,])\s*").expect("valid punctuation pattern"));

/// Guess the MIME type of an image from its extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Encode raw bytes as a base64 `data:` URI.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    let data = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, data)
}

/// Read a file and encode it as a `data:` URI.
pub fn file_to_data_uri(path: &Path) -> Result<String, BundleError> {
    let bytes = fs::read(path).map_err(|e| BundleError::ReadError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    Ok(encode_data_uri(mime_for(path), &bytes))
}

/// Rewrite every local `url(...)` reference in `css` into a data URI.
///
/// References are resolved against the directory of `css_path`. Remote and
/// `data:` references lose their quotes but are otherwise kept; references to
/// files that do not exist are left exactly as written.
pub fn inline_css_urls(css: &str, css_path: &Path) -> Result<String, BundleError> {
    let base_dir = css_path.parent().unwrap_or(Path::new(""));
    let mut output = String::with_capacity(css.len());
    let mut last = 0;

    for caps in CSS_URL.captures_iter(css) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        output.push_str(&css[last..whole.start()]);
        last = whole.end();

        let raw = caps[1].trim().trim_matches(|c: char| c == '\'' || c == '"');

        if raw.starts_with("data:") || raw.starts_with("http") {
            output.push_str(&format!("url({})", raw));
            continue;
        }

        let target = base_dir.join(raw);
        if !target.is_file() {
            tracing::warn!("Stylesheet asset not found: {}", target.display());
            output.push_str(whole.as_str());
            continue;
        }

        tracing::debug!("Inlining stylesheet asset {}", target.display());
        output.push_str(&format!("url({})", file_to_data_uri(&target)?));
    }

    output.push_str(&css[last..]);
    Ok(output)
}

/// Minify CSS lexically: strip comments and collapse whitespace.
pub fn minify_css(css: &str) -> String {
    let css = CSS_COMMENT.replace_all(css, "");
    let css = WHITESPACE.replace_all(&css, " ");
    let css = PUNCTUATION.replace_all(&css, "$1");
    css.replace(";}", "}").trim().to_string()
}

/// Minify CSS using lightningcss.
pub fn optimize_css(css: &str) -> Result<String, BundleError> {
    use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

    let stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| BundleError::CssError(format!("CSS parse error: {}", e)))?;

    let minified = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| BundleError::CssError(format!("CSS minify error: {}", e)))?;

    Ok(minified.code)
}
