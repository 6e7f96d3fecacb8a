//! Patches the guide script to resolve images through the inline map.

use std::sync::LazyLock;

use regex::Regex;

use crate::builder::BundleError;
use crate::images::ImageMap;

static CSV_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)const csvContent = `.*?`;").expect("valid csvContent pattern")
});

/// Avatar assignment in the guide script.
pub const AVATAR_ASSIGNMENT: &str = "img.src = `images/head/${node.runtimeAvatar}`;";

/// Replacement for [`AVATAR_ASSIGNMENT`]: inline image first, relative path as fallback.
pub const AVATAR_RESOLVED: &str = "const avatarSrc = resolveImageSrc(node.runtimeAvatar);\n            img.src = avatarSrc || `images/head/${node.runtimeAvatar}`;";

/// Background art assignment in the guide script.
pub const BACKGROUND_ASSIGNMENT: &str = "dialogArtImg.src = 'images/chart_back8_1.png';";

/// Replacement for [`BACKGROUND_ASSIGNMENT`].
pub const BACKGROUND_RESOLVED: &str = "dialogArtImg.src = resolveImageSrc('chart_back8_1.png');";

/// Render the inline map declaration and its resolver function.
fn resolver_code(images: &ImageMap) -> Result<String, BundleError> {
    Ok(format!(
        r#"
const INLINE_IMAGE_MAP = {};
function resolveImageSrc(name) {{
    if (!name) return '';
    if (name.startsWith('data:')) return name;
    return INLINE_IMAGE_MAP[name] || '';
}}
"#,
        images.to_json()?
    ))
}

/// Embed `images` after the inline CSV block and rewrite known image assignments.
///
/// Fails when the script carries no `const csvContent = `...`;` block.
pub fn patch_script(js: &str, images: &ImageMap) -> Result<String, BundleError> {
    let anchor = CSV_CONTENT
        .find(js)
        .ok_or_else(|| BundleError::MissingAnchor("const csvContent".to_string()))?;

    let mut patched = String::with_capacity(js.len() + 256);
    patched.push_str(&js[..anchor.end()]);
    patched.push_str(&resolver_code(images)?);
    patched.push_str(&js[anchor.end()..]);

    for (from, to) in [
        (AVATAR_ASSIGNMENT, AVATAR_RESOLVED),
        (BACKGROUND_ASSIGNMENT, BACKGROUND_RESOLVED),
    ] {
        if patched.contains(from) {
            patched = patched.replacen(from, to, 1);
        } else {
            tracing::debug!("Script has no `{}` to rewrite", from);
        }
    }

    Ok(patched)
}
