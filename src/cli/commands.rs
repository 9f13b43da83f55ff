// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Four subcommands: `download`, `train`, `evaluate`, `predict`.
// Only paths are configurable; the training hyperparameters are
// fixed in TrainConfig::default().
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::{
    TrainConfig, DEFAULT_DATA_DIR, DEFAULT_METRICS_PATH, DEFAULT_MODEL_PATH,
};
use crate::infra::kaggle::DEFAULT_DATASET;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the NEU surface defect dataset into ./dataset
    Download(DownloadArgs),

    /// Fine-tune MobileNetV2 and write the model and metrics.txt
    Train(TrainArgs),

    /// Score a trained model on a labeled image directory
    Evaluate(EvaluateArgs),

    /// Classify a single image with a trained model
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Kaggle dataset handle, "owner/dataset"
    #[arg(long, default_value = DEFAULT_DATASET)]
    pub dataset: String,

    /// Project directory the dataset is copied into
    #[arg(long, default_value = "dataset")]
    pub dataset_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory holding train/images and validation/images
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Where to save the trained weights (a .json manifest is written beside it)
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// Where to write the final validation accuracy
    #[arg(long, default_value = DEFAULT_METRICS_PATH)]
    pub metrics_path: PathBuf,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            model_path:   a.model_path,
            metrics_path: a.metrics_path,
            ..TrainConfig::default()
        }
        .with_data_dir(a.data_dir)
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Directory with one subdirectory per class
    #[arg(long, default_value = "dataset/NEU-DET/validation/images")]
    pub data_dir: PathBuf,

    /// Trained weights written by `train`
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Image file to classify
    #[arg(long)]
    pub image: PathBuf,

    /// Trained weights written by `train`
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,
}
