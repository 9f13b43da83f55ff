// ============================================================
// Layer 3 — LabeledImage Domain Type
// ============================================================
// One image file on disk together with the index of the class
// directory it was found in. The pixels are not loaded here;
// decoding happens in the data layer.

use std::path::PathBuf;

/// An image path and its class label.
///
/// `label` is an index into the `ClassSet` the image was
/// discovered with, NOT a position in the directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledImage {
    /// Full path to the image file
    pub path: PathBuf,

    /// Class index in `0..num_classes`
    pub label: usize,
}

impl LabeledImage {
    pub fn new(path: impl Into<PathBuf>, label: usize) -> Self {
        Self { path: path.into(), label }
    }

    /// File name used in log messages
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}
