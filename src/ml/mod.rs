// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The network, the training loop and inference.
//
//   backbone.rs   — MobileNetV2 feature extractor
//                   • inverted residual blocks, ReLU6, BatchNorm
//                   • ImageNet weight loading by tensor name
//
//   model.rs      — frozen backbone + global average pooling +
//                   dense softmax head, and the loss / accuracy
//                   helpers shared by training and evaluation
//
//   trainer.rs    — epoch loop: forward, backward, Adam step,
//                   validation after every epoch
//
//   inferencer.rs — evaluation over a split and single-image
//                   prediction from a saved model
//
// The CLI runs on Wgpu; tests run the same generic code on NdArray.
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Sandler et al. (2018) MobileNetV2

use burn::backend::{Autodiff, Wgpu};

/// MobileNetV2 feature extractor
pub mod backbone;

/// Classifier architecture, loss and accuracy
pub mod model;

/// Training loop with per-epoch validation
pub mod trainer;

/// Evaluation and prediction
pub mod inferencer;

/// Backend used for training from the command line
pub type TrainBackend = Autodiff<Wgpu>;

/// Backend used for evaluation and prediction from the command line
pub type InferBackend = Wgpu;
