// ============================================================
// Layer 2 — DownloadUseCase
// ============================================================
//   Step 1: Fetch the dataset into the local cache   (Layer 6)
//   Step 2: Copy it into the project directory once  (Layer 6)

use anyhow::Result;
use std::path::PathBuf;

use crate::domain::traits::DatasetProvider;
use crate::infra::kaggle::{copy_once, CopyOutcome};

pub struct DownloadReport {
    /// Where the provider keeps the dataset
    pub cache_path:  PathBuf,
    /// Project copy of the dataset
    pub dataset_dir: PathBuf,
    pub outcome:     CopyOutcome,
}

pub struct DownloadUseCase<P: DatasetProvider> {
    provider:    P,
    handle:      String,
    dataset_dir: PathBuf,
}

impl<P: DatasetProvider> DownloadUseCase<P> {
    pub fn new(provider: P, handle: impl Into<String>, dataset_dir: impl Into<PathBuf>) -> Self {
        Self { provider, handle: handle.into(), dataset_dir: dataset_dir.into() }
    }

    pub fn execute(&self) -> Result<DownloadReport> {
        let cache_path = self.provider.fetch(&self.handle)?;
        tracing::info!("Dataset '{}' cached at '{}'", self.handle, cache_path.display());

        let outcome = copy_once(&cache_path, &self.dataset_dir)?;
        Ok(DownloadReport { cache_path, dataset_dir: self.dataset_dir.clone(), outcome })
    }
}
