// ============================================================
// Layer 6 — Pretrained Weights Store
// ============================================================
// Fetches the ImageNet MobileNetV2 checkpoint once and parses it
// into plain f32 buffers keyed by tensor name.
//
// The checkpoint is the timm `mobilenetv2_100.ra_in1k` release
// in safetensors format. It is cached under
//
//   <user cache dir>/defect-classifier/weights/
//
// and reused on every later run. Half-precision checkpoints are
// widened to f32 on load; integer tensors (BatchNorm's
// `num_batches_tracked`) are skipped.
//
// Reference: safetensors format documentation

use anyhow::{anyhow, bail, Context, Result};
use half::{bf16, f16};
use safetensors::{Dtype, SafeTensors};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

/// Where the ImageNet checkpoint is downloaded from
pub const BACKBONE_URL: &str =
    "https://huggingface.co/timm/mobilenetv2_100.ra_in1k/resolve/main/model.safetensors";

/// File name of the cached checkpoint
pub const BACKBONE_FILE: &str = "mobilenetv2_100.ra_in1k.safetensors";

/// One named tensor from a checkpoint, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTensor {
    pub shape:  Vec<usize>,
    pub values: Vec<f32>,
}

/// All floating-point tensors of a checkpoint.
///
/// Tensors are handed out with `take` so a loader can tell which
/// entries it never used.
#[derive(Debug, Default)]
pub struct PretrainedWeights {
    tensors: HashMap<String, WeightTensor>,
}

impl PretrainedWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, shape: Vec<usize>, values: Vec<f32>) {
        self.tensors.insert(name.into(), WeightTensor { shape, values });
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Names still held, sorted
    pub fn remaining(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tensors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Remove a tensor, checking it has exactly `shape`.
    pub fn take(&mut self, name: &str, shape: &[usize]) -> Result<Vec<f32>> {
        let tensor = self
            .tensors
            .remove(name)
            .ok_or_else(|| anyhow!("Pretrained weights have no tensor '{name}'"))?;

        if tensor.shape != shape {
            bail!(
                "Pretrained tensor '{name}' has shape {:?}, model expects {:?}",
                tensor.shape,
                shape
            );
        }
        Ok(tensor.values)
    }

    /// Parse a safetensors buffer.
    pub fn from_safetensors(bytes: &[u8]) -> Result<Self> {
        let st = SafeTensors::deserialize(bytes)
            .map_err(|e| anyhow!("Cannot parse safetensors data: {e:?}"))?;

        let mut weights = Self::new();
        for (name, view) in st.tensors() {
            let data = view.data();
            let values: Vec<f32> = match view.dtype() {
                Dtype::F32 => data
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
                Dtype::F16 => data
                    .chunks_exact(2)
                    .map(|b| f16::from_bits(u16::from_le_bytes([b[0], b[1]])).to_f32())
                    .collect(),
                Dtype::BF16 => data
                    .chunks_exact(2)
                    .map(|b| bf16::from_bits(u16::from_le_bytes([b[0], b[1]])).to_f32())
                    .collect(),
                other => {
                    tracing::debug!("Skipping tensor '{}' with dtype {:?}", name, other);
                    continue;
                }
            };
            weights.insert(name, view.shape().to_vec(), values);
        }

        if weights.is_empty() {
            bail!("Checkpoint holds no floating-point tensors");
        }
        tracing::debug!("Parsed {} tensors", weights.len());
        Ok(weights)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Cannot read weights file '{}'", path.display()))?;
        Self::from_safetensors(&bytes)
            .with_context(|| format!("Invalid weights file '{}'", path.display()))
    }
}

/// Downloads and caches the backbone checkpoint.
pub struct WeightsStore {
    dir: PathBuf,
    url: String,
}

impl WeightsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), url: BACKBONE_URL.to_string() }
    }

    /// Store rooted at the per-user cache directory
    pub fn in_user_cache() -> Self {
        Self::new(Self::default_dir())
    }

    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("defect-classifier")
            .join("weights")
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(BACKBONE_FILE)
    }

    /// Load the cached checkpoint, downloading it first if absent.
    pub fn load_or_download(&self) -> Result<PretrainedWeights> {
        let path = self.path();
        if path.exists() {
            tracing::info!("Loading ImageNet weights from '{}'", path.display());
        } else {
            self.download(&path)?;
        }
        PretrainedWeights::from_file(&path)
    }

    fn download(&self, dest: &Path) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create weights cache '{}'", self.dir.display()))?;

        tracing::info!("Downloading ImageNet weights from {}", self.url);
        let mut response = reqwest::blocking::get(&self.url)
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Weights download failed: {}", self.url))?;

        // Write beside the target first so an interrupted download
        // never looks like a cached checkpoint.
        let partial = dest.with_extension("part");
        let mut file = fs::File::create(&partial)
            .with_context(|| format!("Cannot create '{}'", partial.display()))?;
        let bytes = response
            .copy_to(&mut file)
            .with_context(|| format!("Cannot write '{}'", partial.display()))?;
        fs::rename(&partial, dest)
            .with_context(|| format!("Cannot move weights into '{}'", dest.display()))?;

        tracing::info!("Saved {} bytes to '{}'", bytes, dest.display());
        Ok(())
    }
}
