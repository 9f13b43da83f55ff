// ============================================================
// Layer 6 — Model Store
// ============================================================
// Saves and restores the trained classifier.
//
// Two files are written side by side:
//
//   defect_model.mpk    — every parameter and BatchNorm running
//                         statistic (backbone and head), via Burn's
//                         NamedMpkFileRecorder at full precision so
//                         a reloaded model scores exactly the same
//   defect_model.json   — ModelManifest: class names and image size,
//                         needed to rebuild the model before its
//                         weights can be loaded
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::application::train_use_case::TrainConfig;
use crate::domain::class_set::ClassSet;
use crate::ml::model::{DefectClassifier, DefectClassifierConfig};

/// Everything needed to rebuild a saved classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Class names in label order
    pub classes: ClassSet,

    /// Height and width the model was trained on
    pub image_size: u32,

    /// Configuration of the run that produced the weights
    #[serde(default)]
    pub training: Option<TrainConfig>,
}

impl ModelManifest {
    pub fn new(classes: ClassSet, image_size: u32) -> Self {
        Self { classes, image_size, training: None }
    }

    pub fn with_training(mut self, config: TrainConfig) -> Self {
        self.training = Some(config);
        self
    }

    pub fn model_config(&self) -> DefectClassifierConfig {
        DefectClassifierConfig::new(self.classes.len())
    }
}

type ModelRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

const WEIGHTS_EXTENSION: &str = "mpk";

/// Reads and writes a model at a fixed path.
pub struct ModelStore {
    /// Path of the weights file; the manifest uses the same stem
    weights_path: PathBuf,
}

impl ModelStore {
    /// The recorder always writes `.mpk`, so any other extension on
    /// `weights_path` is replaced.
    pub fn new(weights_path: impl Into<PathBuf>) -> Self {
        Self { weights_path: weights_path.into().with_extension(WEIGHTS_EXTENSION) }
    }

    /// Path the weights are actually written to and read from
    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.weights_path.with_extension("json")
    }

    /// Write manifest and weights, replacing earlier files.
    pub fn save<B: Backend>(&self, model: &DefectClassifier<B>, manifest: &ModelManifest) -> Result<()> {
        if model.num_classes != manifest.classes.len() {
            bail!(
                "Model has {} outputs but the manifest lists {} classes",
                model.num_classes,
                manifest.classes.len()
            );
        }

        if let Some(parent) = self.weights_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        let manifest_path = self.manifest_path();
        fs::write(&manifest_path, serde_json::to_string_pretty(manifest)?)
            .with_context(|| format!("Cannot write manifest to '{}'", manifest_path.display()))?;

        model
            .clone()
            .save_file(self.weights_path.clone(), &ModelRecorder::new())
            .with_context(|| format!("Failed to save model to '{}'", self.weights_path.display()))?;

        tracing::debug!("Saved model to '{}'", self.weights_path.display());
        Ok(())
    }

    pub fn load_manifest(&self) -> Result<ModelManifest> {
        let path = self.manifest_path();
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read '{}'. Have you run 'train' first?", path.display())
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed model manifest '{}'", path.display()))
    }

    /// Rebuild the classifier described by the manifest and load its weights.
    pub fn load<B: Backend>(&self, device: &B::Device) -> Result<(DefectClassifier<B>, ModelManifest)> {
        let manifest = self.load_manifest()?;
        if manifest.classes.is_empty() {
            bail!("Model manifest '{}' lists no classes", self.manifest_path().display());
        }

        let model = manifest
            .model_config()
            .init::<B>(device)
            .load_file(self.weights_path.clone(), &ModelRecorder::new(), device)
            .with_context(|| format!("Cannot load model from '{}'", self.weights_path.display()))?;

        tracing::info!(
            "Loaded model '{}' ({} classes)",
            self.weights_path.display(),
            manifest.classes.len()
        );
        Ok((model, manifest))
    }
}
