// ============================================================
// Layer 5 — Defect Classifier
// ============================================================
//   images [N, 3, S, S]
//     → MobileNetV2 features  [N, 1280, S/32, S/32]   (frozen)
//     → global average pool   [N, 1280]
//     → dense                 [N, num_classes]
//     → softmax               class probabilities
//
// Only the dense head is trained. During training the backbone
// runs on the inner (non-autodiff) backend, so no graph is built
// through it and BatchNorm keeps using its ImageNet statistics.

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::{
        activation::{log_softmax, softmax},
        backend::AutodiffBackend,
    },
};

use crate::infra::weights_store::PretrainedWeights;
use crate::ml::backbone::{MobileNetV2, MobileNetV2Config, FEATURE_CHANNELS};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
#[derive(Config, Debug)]
pub struct DefectClassifierConfig {
    pub num_classes: usize,
}

impl DefectClassifierConfig {
    /// Classifier with a randomly initialised backbone. Used as the
    /// skeleton a saved record is loaded into.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DefectClassifier<B> {
        let backbone = MobileNetV2Config::new().init::<B>(device).no_grad();
        self.assemble(backbone, device)
    }

    /// Classifier whose backbone carries the given ImageNet weights.
    pub fn init_pretrained<B: Backend>(
        &self,
        weights: PretrainedWeights,
        device:  &B::Device,
    ) -> Result<DefectClassifier<B>> {
        let backbone = MobileNetV2Config::new()
            .init::<B>(device)
            .load_pretrained(weights, device)?
            .no_grad();
        Ok(self.assemble(backbone, device))
    }

    fn assemble<B: Backend>(&self, backbone: MobileNetV2<B>, device: &B::Device) -> DefectClassifier<B> {
        DefectClassifier {
            backbone,
            pool:        AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            head:        LinearConfig::new(FEATURE_CHANNELS, self.num_classes).init(device),
            num_classes: self.num_classes,
        }
    }
}

#[derive(Module, Debug)]
pub struct DefectClassifier<B: Backend> {
    pub backbone:    MobileNetV2<B>,
    pub pool:        AdaptiveAvgPool2d,
    pub head:        Linear<B>,
    pub num_classes: usize,
}

impl<B: Backend> DefectClassifier<B> {
    /// features [N, 1280, h, w] → logits [N, num_classes]
    fn classify(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let pooled = self.pool.forward(features);
        let [batch, channels, _, _] = pooled.dims();
        self.head.forward(pooled.reshape([batch, channels]))
    }

    /// images [N, 3, S, S] → logits [N, num_classes]
    pub fn forward_logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.classify(self.backbone.forward(images))
    }

    /// images [N, 3, S, S] → class probabilities [N, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward_logits(images), 1)
    }
}

impl<B: AutodiffBackend> DefectClassifier<B> {
    /// Training forward pass. Gradients flow into the head only.
    pub fn forward_loss(
        &self,
        images:  Tensor<B, 4>,
        targets: Tensor<B, 2>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let features = self.backbone.valid().forward(images.inner());
        let logits   = self.classify(Tensor::from_inner(features));
        let loss     = categorical_cross_entropy(logits.clone(), targets);
        (loss, logits)
    }
}

/// Mean of `-sum(target * log softmax(logits))` over the batch.
/// `targets` are one-hot rows.
pub fn categorical_cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    (targets * log_softmax(logits, 1))
        .sum_dim(1)
        .mean()
        .neg()
}

/// Number of predictions in `logits` whose argmax equals `labels`.
pub fn count_correct<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> usize {
    // argmax(1) returns [batch, 1]; flatten to [batch] before comparing
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    predicted
        .equal(labels)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}
