// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the network or persists files:
//
//   kaggle.rs        — dataset download into the kagglehub cache
//                      and the one-time copy into ./dataset
//
//   weights_store.rs — ImageNet MobileNetV2 checkpoint download,
//                      caching and safetensors parsing
//
//   checkpoint.rs    — saving and loading the trained classifier
//                      (weights + JSON manifest)
//
//   metrics.rs       — per-epoch metrics and the metrics.txt file
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Kaggle dataset download and project copy
pub mod kaggle;

/// Pretrained backbone weights
pub mod weights_store;

/// Trained model saving and loading
pub mod checkpoint;

/// Training metrics and the accuracy file
pub mod metrics;
