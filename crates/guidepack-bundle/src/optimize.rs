//! WebP conversion of guide images.
//!
//! PNG and JPEG sources get a `.webp` sibling next to them. A sibling that is
//! at least as new as its source is left alone, so repeated runs only touch
//! images that changed.

use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use rayon::prelude::*;

use crate::builder::BundleError;

/// Quality used for background images.
pub const BACKGROUND_QUALITY: u8 = 78;

/// Quality used for avatar images.
pub const AVATAR_QUALITY: u8 = 80;

/// Extensions that have a WebP counterpart.
const CONVERTIBLE: [&str; 3] = ["png", "jpg", "jpeg"];

/// What happened to a single image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// A new `.webp` was written
    Converted,
    /// The existing `.webp` is newer than its source
    UpToDate,
}

/// Totals for one optimisation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizeReport {
    pub converted: usize,
    pub up_to_date: usize,
    pub failed: usize,
}

/// Path of the `.webp` sibling for a PNG or JPEG, `None` for anything else.
pub fn webp_sibling(path: &Path) -> Option<PathBuf> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    CONVERTIBLE
        .contains(&ext.as_str())
        .then(|| path.with_extension("webp"))
}

/// Whether `dst` exists and was modified no earlier than `src`.
pub fn is_up_to_date(src: &Path, dst: &Path) -> bool {
    let Ok(src_time) = src.metadata().and_then(|m| m.modified()) else {
        return false;
    };
    let Ok(dst_time) = dst.metadata().and_then(|m| m.modified()) else {
        return false;
    };

    dst_time >= src_time
}

/// Encode image bytes as lossy WebP.
pub fn encode_webp(data: &[u8], quality: u8) -> Result<Vec<u8>, BundleError> {
    let img = image::load_from_memory(data)
        .map_err(|e| BundleError::ImageError(format!("Failed to load image: {}", e)))?;

    // The encoder only accepts 8-bit RGB(A)
    let img = DynamicImage::ImageRgba8(img.to_rgba8());

    let encoder = webp::Encoder::from_image(&img).map_err(|e| {
        BundleError::ImageError(format!("Failed to create WebP encoder: {}", e))
    })?;

    Ok(encoder.encode(quality as f32).to_vec())
}

/// Write the `.webp` sibling of `input` unless it is already current.
pub fn ensure_webp(input: &Path, quality: u8) -> Result<Conversion, BundleError> {
    let output = webp_sibling(input).ok_or_else(|| {
        BundleError::ImageError(format!("Not a PNG or JPEG image: {}", input.display()))
    })?;

    if is_up_to_date(input, &output) {
        return Ok(Conversion::UpToDate);
    }

    let data = fs::read(input).map_err(|e| BundleError::ReadError {
        path: input.display().to_string(),
        message: e.to_string(),
    })?;
    let encoded = encode_webp(&data, quality)?;

    fs::write(&output, &encoded)
        .map_err(|e| BundleError::WriteError(format!("{}: {}", output.display(), e)))?;

    tracing::debug!(
        "Converted {} ({} -> {} bytes)",
        input.display(),
        data.len(),
        encoded.len()
    );

    Ok(Conversion::Converted)
}

/// Convert the backgrounds and every PNG/JPEG directly inside `head_dir`.
///
/// Missing or undecodable images are logged and counted as failures; they
/// never abort the run.
pub fn optimize_images(head_dir: &Path, backgrounds: &[PathBuf]) -> OptimizeReport {
    let mut jobs: Vec<(PathBuf, u8)> = backgrounds
        .iter()
        .map(|path| (path.clone(), BACKGROUND_QUALITY))
        .collect();

    match fs::read_dir(head_dir) {
        Ok(entries) => {
            let mut avatars: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|path| path.is_file() && webp_sibling(path).is_some())
                .collect();
            avatars.sort();
            jobs.extend(avatars.into_iter().map(|path| (path, AVATAR_QUALITY)));
        }
        Err(e) => tracing::warn!("Missing head directory {}: {}", head_dir.display(), e),
    }

    let outcomes: Vec<Result<Conversion, BundleError>> = jobs
        .par_iter()
        .map(|(path, quality)| {
            ensure_webp(path, *quality).inspect_err(|e| {
                tracing::warn!("Skip {}: {}", path.display(), e);
            })
        })
        .collect();

    let mut report = OptimizeReport::default();
    for outcome in outcomes {
        match outcome {
            Ok(Conversion::Converted) => report.converted += 1,
            Ok(Conversion::UpToDate) => report.up_to_date += 1,
            Err(_) => report.failed += 1,
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use pretty_assertions::assert_eq;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    fn write_png(path: &Path) {
        let img = RgbImage::from_pixel(4, 4, Rgb([200, 40, 40]));
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn finds_webp_siblings() {
        assert_eq!(
            webp_sibling(Path::new("head/a.PNG")),
            Some(PathBuf::from("head/a.webp"))
        );
        assert_eq!(
            webp_sibling(Path::new("head/a.jpeg")),
            Some(PathBuf::from("head/a.webp"))
        );
        assert_eq!(webp_sibling(Path::new("head/a.gif")), None);
        assert_eq!(webp_sibling(Path::new("head/a.webp")), None);
    }

    #[test]
    fn converts_once_until_source_changes() {
        let temp = tempdir().unwrap();
        let png = temp.path().join("bg.png");
        write_png(&png);

        assert_eq!(ensure_webp(&png, 78).unwrap(), Conversion::Converted);
        let webp = fs::read(temp.path().join("bg.webp")).unwrap();
        assert_eq!(&webp[..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");

        assert_eq!(ensure_webp(&png, 78).unwrap(), Conversion::UpToDate);

        fs::File::options()
            .write(true)
            .open(&png)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        assert_eq!(ensure_webp(&png, 78).unwrap(), Conversion::Converted);
    }

    #[test]
    fn rejects_undecodable_image() {
        let temp = tempdir().unwrap();
        let png = temp.path().join("broken.png");
        fs::write(&png, b"not a png").unwrap();

        assert!(matches!(ensure_webp(&png, 80), Err(BundleError::ImageError(_))));
        assert!(!temp.path().join("broken.webp").exists());
    }

    #[test]
    fn optimizes_backgrounds_and_avatars() {
        let temp = tempdir().unwrap();
        let head = temp.path().join("images/head");
        fs::create_dir_all(&head).unwrap();
        write_png(&head.join("a.png"));
        write_png(&head.join("b.png"));
        fs::write(head.join("c.gif"), b"GIF").unwrap();
        fs::write(head.join("d.png"), b"not a png").unwrap();
        let background = temp.path().join("images/chart_back8_1.png");
        write_png(&background);
        let missing = temp.path().join("images/egg.png");

        let report = optimize_images(&head, &[background, missing]);

        assert_eq!(
            report,
            OptimizeReport {
                converted: 3,
                up_to_date: 0,
                failed: 2,
            }
        );
        assert!(head.join("a.webp").exists());
        assert!(temp.path().join("images/chart_back8_1.webp").exists());

        let again = optimize_images(&head, &[temp.path().join("images/chart_back8_1.png")]);
        assert_eq!(again.converted, 0);
        assert_eq!(again.up_to_date, 3);
    }
}
