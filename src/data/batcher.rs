// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<ImageItem> into
// tensors for one forward pass.
//
//   Input:  N ImageItems, each S*S*3 HWC bytes
//   Output: DefectBatch with
//             images  [N, 3, S, S]  rescaled to [0, 1]
//             targets [N, C]        one-hot labels
//             labels  [N]           class indices (for accuracy)
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
    prelude::*,
};
use std::sync::Arc;

use crate::data::{
    dataset::{DefectDataset, ImageItem},
    preprocessor::{ImagePreprocessor, CHANNELS},
};

/// A batch of images ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct DefectBatch<B: Backend> {
    /// Rescaled pixels, shape [batch_size, 3, size, size]
    pub images: Tensor<B, 4>,

    /// One-hot encoded labels, shape [batch_size, num_classes]
    pub targets: Tensor<B, 2>,

    /// Class indices, shape [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct DefectBatcher<B: Backend> {
    pub device:       B::Device,
    pub preprocessor: ImagePreprocessor,
    pub num_classes:  usize,
}

impl<B: Backend> DefectBatcher<B> {
    pub fn new(device: B::Device, preprocessor: ImagePreprocessor, num_classes: usize) -> Self {
        Self { device, preprocessor, num_classes }
    }
}

/// One-hot encode class indices into a flat row-major buffer.
pub fn one_hot(labels: &[usize], num_classes: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; labels.len() * num_classes];
    for (row, &label) in labels.iter().enumerate() {
        out[row * num_classes + label] = 1.0;
    }
    out
}

impl<B: Backend> Batcher<ImageItem, DefectBatch<B>> for DefectBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>) -> DefectBatch<B> {
        let batch_size = items.len();
        let size       = self.preprocessor.size();

        // ── Pixels: HWC u8 → CHW f32 in [0, 1], concatenated per sample ──────
        let mut pixels = Vec::with_capacity(batch_size * self.preprocessor.pixel_count());
        for item in &items {
            pixels.extend(self.preprocessor.rescale(&item.pixels));
        }

        let labels: Vec<usize> = items.iter().map(|item| item.label).collect();
        let targets = one_hot(&labels, self.num_classes);
        let label_ids: Vec<i32> = labels.iter().map(|&l| l as i32).collect();

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, CHANNELS, size, size]);

        let targets = Tensor::<B, 1>::from_floats(targets.as_slice(), &self.device)
            .reshape([batch_size, self.num_classes]);

        let labels = Tensor::<B, 1, Int>::from_ints(label_ids.as_slice(), &self.device);

        DefectBatch { images, targets, labels }
    }
}

/// Wrap a dataset in a single-worker DataLoader.
/// `shuffle_seed` reshuffles every pass; `None` keeps dataset order.
pub fn batch_loader<B: Backend>(
    batcher:      DefectBatcher<B>,
    dataset:      DefectDataset,
    batch_size:   usize,
    shuffle_seed: Option<u64>,
) -> Arc<dyn DataLoader<DefectBatch<B>>> {
    let builder = DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .num_workers(1);
    match shuffle_seed {
        Some(seed) => builder.shuffle(seed).build(dataset),
        None       => builder.build(dataset),
    }
}
