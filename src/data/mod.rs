// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a directory of class folders to tensor
// batches ready for the model.
//
//   <split>/images/<class>/*.jpg
//       │
//       ▼
//   ImageFolderLoader  → discovers classes, lists labeled files
//       │
//       ▼
//   ImagePreprocessor  → decodes, resizes to 200x200 RGB
//       │
//       ▼
//   DefectDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   DefectBatcher      → rescales by 1/255, one-hot labels,
//       │                stacks samples into tensors
//       ▼
//   DataLoader         → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Scans directory-per-class image trees
pub mod loader;

/// Decodes, resizes and rescales images
pub mod preprocessor;

/// Implements Burn's Dataset trait for decoded images
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
