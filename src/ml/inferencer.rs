// ============================================================
// Layer 5 — Evaluation and Prediction
// ============================================================
use anyhow::{anyhow, Result};
use burn::{data::dataloader::DataLoader, prelude::*};
use std::path::Path;

use crate::data::{batcher::DefectBatch, preprocessor::{ImagePreprocessor, CHANNELS}};
use crate::infra::{
    checkpoint::{ModelManifest, ModelStore},
    metrics::accuracy,
};
use crate::ml::model::{categorical_cross_entropy, count_correct, DefectClassifier};

/// Loss and accuracy of a model over one split
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss:     f64,
    pub accuracy: f64,
    pub samples:  usize,
}

/// Run `model` over every batch, weighting each batch by its size.
pub fn evaluate<B: Backend>(model: &DefectClassifier<B>, loader: &dyn DataLoader<DefectBatch<B>>) -> Evaluation {
    let mut loss_sum = 0.0f64;
    let mut correct  = 0usize;
    let mut samples  = 0usize;

    for batch in loader.iter() {
        let batch_size = batch.labels.dims()[0];
        let logits     = model.forward_logits(batch.images);

        let loss: f64 = categorical_cross_entropy(logits.clone(), batch.targets)
            .into_scalar()
            .elem();
        loss_sum += loss * batch_size as f64;
        correct  += count_correct(logits, batch.labels);
        samples  += batch_size;
    }

    let loss = if samples > 0 { loss_sum / samples as f64 } else { f64::NAN };
    Evaluation { loss, accuracy: accuracy(correct, samples), samples }
}

/// Most probable class for one image
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_name:  String,
    pub probability: f32,
    /// (class name, probability) for every class, in label order
    pub scores:      Vec<(String, f32)>,
}

/// A reloaded classifier ready to label single images.
pub struct Predictor<B: Backend> {
    model:        DefectClassifier<B>,
    manifest:     ModelManifest,
    preprocessor: ImagePreprocessor,
    device:       B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn from_store(store: &ModelStore, device: B::Device) -> Result<Self> {
        let (model, manifest) = store.load::<B>(&device)?;
        let preprocessor      = ImagePreprocessor::new(manifest.image_size);
        Ok(Self { model, manifest, preprocessor, device })
    }

    pub fn predict(&self, image: &Path) -> Result<Prediction> {
        let size   = self.preprocessor.size();
        let pixels = self.preprocessor.rescale(&self.preprocessor.load(image)?);
        let input  = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([1, CHANNELS, size, size]);

        let probabilities: Vec<f32> = self
            .model
            .forward(input)
            .into_data()
            .iter::<f32>()
            .collect();

        let (label, probability) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        let classes    = &self.manifest.classes;
        let class_name = classes
            .name(label)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Model produced class {label} but knows {} classes", classes.len()))?;
        let scores = classes.names().iter().cloned().zip(probabilities).collect();

        tracing::debug!("Predicted '{}' for '{}'", class_name, image.display());
        Ok(Prediction { class_name, probability, scores })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};

    use crate::data::{batcher::{batch_loader, DefectBatcher}, dataset::{DefectDataset, ImageItem}};
    use crate::domain::class_set::ClassSet;
    use crate::ml::model::DefectClassifierConfig;

    type TestBackend = NdArray;

    #[test]
    fn test_evaluate_counts_every_sample() {
        let device  = Default::default();
        let model   = DefectClassifierConfig::new(2).init::<TestBackend>(&device);
        let pre     = ImagePreprocessor::new(32);
        let items   = (0..3)
            .map(|i| ImageItem { pixels: vec![(i * 60) as u8; pre.pixel_count()], label: i % 2 })
            .collect();
        let loader  = batch_loader(
            DefectBatcher::<TestBackend>::new(device, pre, 2),
            DefectDataset::new(items),
            2,
            None,
        );

        let eval = evaluate(&model, loader.as_ref());
        assert_eq!(eval.samples, 3);
        assert!((0.0..=1.0).contains(&eval.accuracy));
        assert!(eval.loss.is_finite());
    }

    #[test]
    fn test_predict_returns_known_class() {
        let tmp    = tempfile::tempdir().unwrap();
        let store  = ModelStore::new(tmp.path().join("defect_model.mpk"));
        let device = Default::default();
        let model  = DefectClassifierConfig::new(3).init::<TestBackend>(&device);
        store
            .save(&model, &ModelManifest::new(ClassSet::new(["a", "b", "c"]), 32))
            .unwrap();

        let image = tmp.path().join("sample.png");
        RgbImage::from_pixel(50, 40, Rgb([90, 90, 90])).save(&image).unwrap();

        let predictor  = Predictor::<TestBackend>::from_store(&store, device).unwrap();
        let prediction = predictor.predict(&image).unwrap();

        let names: Vec<&str> = prediction.scores.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let best = prediction
            .scores
            .iter()
            .find(|(n, _)| *n == prediction.class_name)
            .unwrap();
        assert_eq!(best.1, prediction.probability);
        assert!(prediction.scores.iter().all(|(_, p)| *p <= prediction.probability));

        let total: f32 = prediction.scores.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }
}
