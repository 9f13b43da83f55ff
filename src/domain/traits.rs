// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to these traits rather than to
// concrete loaders, so the directory-per-class loader and the
// Kaggle downloader can be exercised independently in tests.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::PathBuf;

use crate::domain::{class_set::ClassSet, labeled_image::LabeledImage};

// ─── ImageSource ──────────────────────────────────────────────────────────────
/// Any component that can enumerate labeled images.
///
/// Implementations:
///   - ImageFolderLoader → one directory per class
pub trait ImageSource {
    /// Discover the class names offered by this source.
    fn classes(&self) -> Result<ClassSet>;

    /// List every image, labeled against `classes`.
    /// Fails if the source holds a class `classes` does not know.
    fn load_all(&self, classes: &ClassSet) -> Result<Vec<LabeledImage>>;
}

// ─── DatasetProvider ──────────────────────────────────────────────────────────
/// Any component that can make a named dataset available on the
/// local filesystem.
///
/// Implementations:
///   - KaggleClient → downloads into the kagglehub cache
pub trait DatasetProvider {
    /// Ensure the dataset `handle` ("owner/slug") is present locally
    /// and return the directory holding its files.
    fn fetch(&self, handle: &str) -> Result<PathBuf>;
}
