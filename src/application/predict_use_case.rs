// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
use anyhow::Result;
use burn::prelude::*;
use std::path::{Path, PathBuf};

use crate::infra::checkpoint::ModelStore;
use crate::ml::{
    inferencer::{Prediction, Predictor},
    InferBackend,
};

pub struct PredictUseCase {
    model_path: PathBuf,
}

impl PredictUseCase {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self { model_path: model_path.into() }
    }

    pub fn execute(&self, image: &Path) -> Result<Prediction> {
        self.execute_on::<InferBackend>(image, burn::backend::wgpu::WgpuDevice::default())
    }

    pub fn execute_on<B: Backend>(&self, image: &Path, device: B::Device) -> Result<Prediction> {
        let predictor = Predictor::<B>::from_store(&ModelStore::new(&self.model_path), device)?;
        predictor.predict(image)
    }
}
