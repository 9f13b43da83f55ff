// ============================================================
// Layer 6 — Metrics
// ============================================================
// Two kinds of metrics come out of a training run:
//
//   EpochMetrics  — loss and accuracy for both splits after each
//                   epoch. Kept in memory and logged, not saved.
//
//   metrics.txt   — the final validation accuracy as a single
//                   plain decimal in [0, 1], e.g. `0.8333333`.
//                   This is the only metric written to disk.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

/// Loss and accuracy for one training epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Mean categorical cross-entropy over training batches
    pub train_loss: f64,

    /// Fraction of training images classified correctly, [0, 1]
    pub train_acc: f64,

    /// Mean categorical cross-entropy over validation batches
    pub val_loss: f64,

    /// Fraction of validation images classified correctly, [0, 1]
    pub val_acc: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, train_acc: f64, val_loss: f64, val_acc: f64) -> Self {
        Self { epoch, train_loss, train_acc, val_loss, val_acc }
    }

    /// One-line summary printed after each epoch
    pub fn summary(&self, total_epochs: usize) -> String {
        format!(
            "Epoch {}/{} | loss={:.4} | accuracy={:.4} | val_loss={:.4} | val_accuracy={:.4}",
            self.epoch, total_epochs,
            self.train_loss, self.train_acc,
            self.val_loss, self.val_acc,
        )
    }
}

/// Fraction correct, 0.0 for an empty set
pub fn accuracy(correct: usize, total: usize) -> f64 {
    if total > 0 { correct as f64 / total as f64 } else { 0.0 }
}

/// Writes the final validation accuracy file.
pub struct AccuracyFile {
    path: PathBuf,
}

impl AccuracyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Overwrite the file with `accuracy` as plain decimal text.
    pub fn write(&self, accuracy: f64) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        // `{:?}` keeps the decimal point on whole numbers (1.0, not 1)
        fs::write(&self.path, format!("{accuracy:?}"))
            .with_context(|| format!("Cannot write metrics to '{}'", self.path.display()))?;
        tracing::debug!("Wrote accuracy {} to '{}'", accuracy, self.path.display());
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(3, 4), 0.75);
        assert_eq!(accuracy(0, 0), 0.0);
    }

    #[test]
    fn test_accuracy_file_is_single_decimal() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metrics.txt");
        AccuracyFile::new(&path).write(0.875).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "0.875");
        assert_eq!(text.parse::<f64>().unwrap(), 0.875);
    }

    #[test]
    fn test_write_overwrites() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out").join("metrics.txt");
        let file = AccuracyFile::new(&path);
        file.write(0.5).unwrap();
        file.write(1.0).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1.0");
    }

    #[test]
    fn test_summary_line() {
        let m = EpochMetrics::new(2, 0.5, 0.75, 0.25, 1.0);
        assert_eq!(
            m.summary(5),
            "Epoch 2/5 | loss=0.5000 | accuracy=0.7500 | val_loss=0.2500 | val_accuracy=1.0000"
        );
    }
}
