//! Single-file bundler for static guides.
//!
//! Inlines a guide's stylesheet, script and images into one self-contained
//! HTML document: CSS `url()` references and avatar images become base64 data
//! URIs, and the script learns to resolve image names through an inline map.

pub mod assets;
pub mod builder;
pub mod html;
pub mod images;
pub mod optimize;
pub mod root;
pub mod script;

pub use builder::{BundleConfig, BundleError, BundleResult, Bundler, CssOptimizer, Rendered};
pub use images::ImageMap;
pub use optimize::OptimizeReport;
pub use root::find_project_root;
