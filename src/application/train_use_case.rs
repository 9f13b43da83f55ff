// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Scan train + validation trees     (Layer 4 - data)
//   Step 2: Decode and resize every image     (Layer 4 - data)
//   Step 3: Build data loaders                (Layer 4 - data)
//   Step 4: Build the classifier              (Layer 5 - ml, Layer 6 - weights)
//   Step 5: Run training loop                 (Layer 5 - ml)
//   Step 6: Save model + manifest             (Layer 6 - infra)
//   Step 7: Evaluate and write metrics.txt    (Layer 5 - ml, Layer 6 - infra)
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    batcher::{batch_loader, DefectBatcher},
    dataset::DefectDataset,
    loader::ImageFolderLoader,
    preprocessor::ImagePreprocessor,
};
use crate::domain::{class_set::ClassSet, traits::ImageSource};
use crate::infra::{
    checkpoint::{ModelManifest, ModelStore},
    metrics::{AccuracyFile, EpochMetrics},
    weights_store::WeightsStore,
};
use crate::ml::{
    inferencer::{evaluate, Evaluation},
    model::DefectClassifierConfig,
    trainer::run_training,
    TrainBackend,
};

/// Root of the NEU-DET tree inside the project dataset directory
pub const DEFAULT_DATA_DIR: &str = "dataset/NEU-DET";
pub const DEFAULT_MODEL_PATH: &str = "defect_model.mpk";
pub const DEFAULT_METRICS_PATH: &str = "metrics.txt";

/// How the backbone's weights are initialised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackboneInit {
    /// Download (once) and load the ImageNet checkpoint
    ImageNet,
    /// Random weights; no network access
    Random,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// The hyperparameters are fixed; only the paths change between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub train_dir:     PathBuf,
    pub val_dir:       PathBuf,
    pub model_path:    PathBuf,
    pub metrics_path:  PathBuf,
    pub image_size:    u32,
    pub batch_size:    usize,
    pub epochs:        usize,
    pub learning_rate: f64,
    pub seed:          u64,
    pub backbone:      BackboneInit,
}

impl TrainConfig {
    /// `train/images` and `validation/images` under `data_dir`
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir   = data_dir.into();
        self.train_dir = data_dir.join("train").join("images");
        self.val_dir   = data_dir.join("validation").join("images");
        self
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_dir:     PathBuf::new(),
            val_dir:       PathBuf::new(),
            model_path:    PathBuf::from(DEFAULT_MODEL_PATH),
            metrics_path:  PathBuf::from(DEFAULT_METRICS_PATH),
            image_size:    200,
            batch_size:    32,
            epochs:        5,
            learning_rate: 1e-3,
            seed:          42,
            backbone:      BackboneInit::ImageNet,
        }
        .with_data_dir(DEFAULT_DATA_DIR)
    }
}

/// What a finished run produced
pub struct TrainReport {
    pub classes:    ClassSet,
    /// Where the weights were written
    pub model_path: PathBuf,
    pub history:    Vec<EpochMetrics>,
    /// Final evaluation of the saved model on the validation split
    pub validation: Evaluation,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Train on the default GPU device
    pub fn execute(&self) -> Result<TrainReport> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        self.execute_on::<TrainBackend>(device)
    }

    /// Execute the full training pipeline end to end on backend `B`
    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Scan both splits ──────────────────────────────────────────
        // Labels for both splits come from the training classes; the
        // validation tree must hold exactly the same class folders.
        let train_source = ImageFolderLoader::new(&cfg.train_dir);
        let classes      = train_source.classes()?;
        let train_images = train_source.load_all(&classes)?;
        let val_images   = ImageFolderLoader::new(&cfg.val_dir).load_all(&classes)?;
        tracing::info!("Classes: {:?}", classes.names());

        // ── Step 2: Decode + resize ───────────────────────────────────────────
        let preprocessor  = ImagePreprocessor::new(cfg.image_size);
        let train_dataset = DefectDataset::decode(&train_images, &preprocessor)?;
        let val_dataset   = DefectDataset::decode(&val_images, &preprocessor)?;
        tracing::info!(
            "Decoded {} training and {} validation images",
            train_dataset.sample_count(),
            val_dataset.sample_count()
        );
        tracing::debug!(
            "Images per class: train {:?}, validation {:?}",
            train_dataset.class_counts(classes.len()),
            val_dataset.class_counts(classes.len()),
        );

        // ── Step 3: Data loaders ──────────────────────────────────────────────
        // Training order is reshuffled every epoch from a fixed seed;
        // validation runs on the inner backend in file order.
        let train_loader = batch_loader(
            DefectBatcher::<B>::new(device.clone(), preprocessor, classes.len()),
            train_dataset,
            cfg.batch_size,
            Some(cfg.seed),
        );
        let val_loader = batch_loader(
            DefectBatcher::<B::InnerBackend>::new(device.clone(), preprocessor, classes.len()),
            val_dataset,
            cfg.batch_size,
            None,
        );

        // ── Step 4: Build classifier ──────────────────────────────────────────
        B::seed(cfg.seed);
        let model_cfg = DefectClassifierConfig::new(classes.len());
        let model = match cfg.backbone {
            BackboneInit::ImageNet => {
                let weights = WeightsStore::in_user_cache().load_or_download()?;
                model_cfg.init_pretrained::<B>(weights, &device)?
            }
            BackboneInit::Random => model_cfg.init::<B>(&device),
        };
        tracing::info!(
            "Model ready: MobileNetV2 backbone ({} blocks), {} output classes",
            model.backbone.block_count(),
            model.num_classes
        );

        // ── Step 5: Train ─────────────────────────────────────────────────────
        let outcome = run_training(cfg, model, train_loader.as_ref(), val_loader.as_ref())?;

        // ── Step 6: Save model + manifest ─────────────────────────────────────
        let model    = outcome.model.valid();
        let manifest = ModelManifest::new(classes.clone(), cfg.image_size).with_training(cfg.clone());
        let store    = ModelStore::new(&cfg.model_path);
        store.save(&model, &manifest)?;
        let model_path = store.weights_path().to_path_buf();
        tracing::info!("Model saved as '{}'", model_path.display());

        // ── Step 7: Final evaluation + metrics.txt ────────────────────────────
        let validation = evaluate(&model, val_loader.as_ref());
        AccuracyFile::new(&cfg.metrics_path).write(validation.accuracy)?;

        Ok(TrainReport { classes, model_path, history: outcome.history, validation })
    }
}
