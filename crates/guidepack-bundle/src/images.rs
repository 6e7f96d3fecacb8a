//! Avatar extraction and the inline image map.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use regex::Regex;

use crate::assets::file_to_data_uri;
use crate::builder::BundleError;
use crate::optimize::webp_sibling;

/// CSV column holding avatar file names.
pub const AVATAR_COLUMN: &str = "Avatar";

static TRAILING_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i),([a-z0-9]+)$").expect("valid extension pattern"));

/// Ordered mapping from image name to data URI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMap {
    entries: IndexMap<String, String>,
}

impl ImageMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Re-inserting a name keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, data_uri: impl Into<String>) {
        self.entries.insert(name.into(), data_uri.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Serialize as a JSON object literal, preserving order and non-ASCII text.
    pub fn to_json(&self) -> Result<String, BundleError> {
        serde_json::to_string(&self.entries).map_err(|e| BundleError::JsonError(e.to_string()))
    }
}

/// File name for an avatar cell: trim, drop wrapping quotes, repair `name,png`.
pub fn normalize_avatar_name(raw: &str) -> String {
    let mut value = raw.trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value = &value[1..value.len() - 1];
    }
    TRAILING_EXT.replace(value, ".$1").into_owned()
}

/// Collect non-empty, trimmed avatar cells from the CSV at `csv_path`, in row order.
///
/// Names are kept as written since the script looks images up by the cell
/// value. A missing file yields no names.
pub fn extract_avatar_names(csv_path: &Path) -> Result<Vec<String>, BundleError> {
    if !csv_path.exists() {
        tracing::warn!("Avatar CSV not found: {}", csv_path.display());
        return Ok(Vec::new());
    }

    let csv_error = |e: csv::Error| BundleError::CsvError {
        path: csv_path.display().to_string(),
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(csv_path)
        .map_err(csv_error)?;

    let Some(column) = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .position(|h| h == AVATAR_COLUMN)
    else {
        tracing::warn!("No {} column in {}", AVATAR_COLUMN, csv_path.display());
        return Ok(Vec::new());
    };

    let mut names = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        let name = record.get(column).unwrap_or("").trim();
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }

    Ok(names)
}

/// Pick the file to embed for `path`, preferring an existing `.webp` sibling.
fn resolve_image(path: PathBuf, prefer_webp: bool) -> PathBuf {
    if prefer_webp {
        if let Some(webp) = webp_sibling(&path).filter(|webp| webp.is_file()) {
            return webp;
        }
    }
    path
}

/// Encode each avatar found in `head_dir`, then the background image.
///
/// Entries are keyed by the name as given; the file is located through
/// [`normalize_avatar_name`], and through its `.webp` sibling when
/// `prefer_webp` is set. Avatars missing on disk are skipped. Encoding runs
/// in parallel; the map keeps the order in which names were given.
pub fn build_image_map(
    head_dir: &Path,
    background: Option<&Path>,
    avatar_names: &[String],
    prefer_webp: bool,
) -> Result<ImageMap, BundleError> {
    let unique: Vec<&String> = avatar_names.iter().collect::<IndexSet<_>>().into_iter().collect();

    let encoded: Vec<Result<Option<(String, String)>, BundleError>> = unique
        .par_iter()
        .map(|name| -> Result<Option<(String, String)>, BundleError> {
            let candidate = resolve_image(head_dir.join(normalize_avatar_name(name)), prefer_webp);
            if !candidate.is_file() {
                tracing::warn!("Avatar image not found: {}", candidate.display());
                return Ok(None);
            }
            tracing::debug!("Inlining avatar {}", candidate.display());
            Ok(Some(((*name).clone(), file_to_data_uri(&candidate)?)))
        })
        .collect();

    let mut images = ImageMap::new();
    for entry in encoded {
        if let Some((name, uri)) = entry? {
            images.insert(name, uri);
        }
    }

    if let Some(background) = background {
        if background.is_file() {
            let name = background
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let file = resolve_image(background.to_path_buf(), prefer_webp);
            images.insert(name, file_to_data_uri(&file)?);
        } else {
            tracing::warn!("Background image not found: {}", background.display());
        }
    }

    Ok(images)
}
