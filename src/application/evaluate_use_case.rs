// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
//   Step 1: Reload model + manifest               (Layer 6 - infra)
//   Step 2: Scan the split against its classes    (Layer 4 - data)
//   Step 3: Decode, batch and score               (Layers 4 + 5)

use anyhow::Result;
use burn::prelude::*;
use std::path::PathBuf;

use crate::data::{
    batcher::{batch_loader, DefectBatcher},
    dataset::DefectDataset,
    loader::ImageFolderLoader,
    preprocessor::ImagePreprocessor,
};
use crate::domain::traits::ImageSource;
use crate::infra::checkpoint::ModelStore;
use crate::ml::{
    inferencer::{evaluate, Evaluation},
    InferBackend,
};

pub struct EvaluateUseCase {
    model_path: PathBuf,
    data_dir:   PathBuf,
    batch_size: usize,
}

impl EvaluateUseCase {
    pub fn new(model_path: impl Into<PathBuf>, data_dir: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self { model_path: model_path.into(), data_dir: data_dir.into(), batch_size }
    }

    pub fn execute(&self) -> Result<Evaluation> {
        self.execute_on::<InferBackend>(burn::backend::wgpu::WgpuDevice::default())
    }

    pub fn execute_on<B: Backend>(&self, device: B::Device) -> Result<Evaluation> {
        let (model, manifest) = ModelStore::new(&self.model_path).load::<B>(&device)?;

        // The split must hold exactly the classes the model was trained on
        let images       = ImageFolderLoader::new(&self.data_dir).load_all(&manifest.classes)?;
        let preprocessor = ImagePreprocessor::new(manifest.image_size);
        let dataset      = DefectDataset::decode(&images, &preprocessor)?;

        let loader = batch_loader(
            DefectBatcher::<B>::new(device, preprocessor, manifest.classes.len()),
            dataset,
            self.batch_size,
            None,
        );

        let evaluation = evaluate(&model, loader.as_ref());
        tracing::info!(
            "Evaluated {} images: loss={:.4}, accuracy={:.4}",
            evaluation.samples,
            evaluation.loss,
            evaluation.accuracy
        );
        Ok(evaluation)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};
    use std::fs;

    use crate::domain::class_set::ClassSet;
    use crate::infra::checkpoint::ModelManifest;
    use crate::ml::model::DefectClassifierConfig;

    type TestBackend = NdArray;

    #[test]
    fn test_split_with_other_classes_is_rejected() {
        let tmp   = tempfile::tempdir().unwrap();
        let path  = tmp.path().join("defect_model.mpk");
        let store = ModelStore::new(&path);
        let model = DefectClassifierConfig::new(2).init::<TestBackend>(&Default::default());
        store
            .save(&model, &ModelManifest::new(ClassSet::new(["crazing", "patches"]), 32))
            .unwrap();

        let split = tmp.path().join("validation");
        for class in ["crazing", "scratches"] {
            fs::create_dir_all(split.join(class)).unwrap();
            RgbImage::from_pixel(32, 32, Rgb([1, 2, 3]))
                .save(split.join(class).join("x.png"))
                .unwrap();
        }

        let result = EvaluateUseCase::new(&path, &split, 8)
            .execute_on::<TestBackend>(Default::default());
        assert!(result.is_err());
    }
}
