use anyhow::{Context, Result};
use burn::data::dataset::Dataset;

use crate::data::preprocessor::ImagePreprocessor;
use crate::domain::labeled_image::LabeledImage;

/// One decoded, resized image and its class index.
/// Pixels are HWC RGB bytes; rescaling happens in the batcher.
#[derive(Debug, Clone)]
pub struct ImageItem {
    pub pixels: Vec<u8>,
    pub label:  usize,
}

pub struct DefectDataset {
    items: Vec<ImageItem>,
}

impl DefectDataset {
    pub fn new(items: Vec<ImageItem>) -> Self { Self { items } }

    /// Decode every image up front. Any unreadable file fails the
    /// whole split instead of silently shrinking it.
    pub fn decode(images: &[LabeledImage], preprocessor: &ImagePreprocessor) -> Result<Self> {
        let mut items = Vec::with_capacity(images.len());
        for image in images {
            let pixels = preprocessor
                .load(&image.path)
                .with_context(|| format!("Class {} sample '{}'", image.label, image.file_name()))?;
            items.push(ImageItem { pixels, label: image.label });
        }
        tracing::debug!("Decoded {} images", items.len());
        Ok(Self::new(items))
    }

    pub fn sample_count(&self) -> usize { self.items.len() }

    /// Number of samples per class index, for logging
    pub fn class_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for item in &self.items {
            if let Some(c) = counts.get_mut(item.label) {
                *c += 1;
            }
        }
        counts
    }
}

impl Dataset<ImageItem> for DefectDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
