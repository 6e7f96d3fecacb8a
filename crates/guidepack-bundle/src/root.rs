//! Project root discovery.

use std::fs;
use std::path::{Path, PathBuf};

/// Files or directories whose presence marks a project root.
pub const ROOT_MARKERS: &[&str] = &[".git", "pom.xml", "Cargo.toml"];

/// Walk upward from `start` and return the first directory holding a root marker.
///
/// Falls back to `start` itself when no ancestor carries a marker.
pub fn find_project_root(start: &Path) -> PathBuf {
    let start = fs::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());

    for dir in start.ancestors() {
        if ROOT_MARKERS.iter().any(|marker| dir.join(marker).exists()) {
            tracing::debug!("Project root: {}", dir.display());
            return dir.to_path_buf();
        }
    }

    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_git_marker_in_ancestor() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("repo");
        let guide = root.join("src/main/resources/guide");
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(&guide).unwrap();

        let found = find_project_root(&guide);

        assert_eq!(found, fs::canonicalize(&root).unwrap());
    }

    #[test]
    fn finds_build_descriptor() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("app");
        let guide = root.join("guide");
        fs::create_dir_all(&guide).unwrap();
        fs::write(root.join("pom.xml"), "<project/>").unwrap();

        assert_eq!(find_project_root(&guide), fs::canonicalize(&root).unwrap());
    }

    #[test]
    fn prefers_nearest_marker() {
        let temp = tempdir().unwrap();
        let outer = temp.path().join("outer");
        let inner = outer.join("inner");
        fs::create_dir_all(outer.join(".git")).unwrap();
        fs::create_dir_all(&inner).unwrap();
        fs::write(inner.join("Cargo.toml"), "[package]").unwrap();

        assert_eq!(find_project_root(&inner), fs::canonicalize(&inner).unwrap());
    }
}
