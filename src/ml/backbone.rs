// ============================================================
// Layer 5 — MobileNetV2 Feature Extractor
// ============================================================
// MobileNetV2 (width 1.0) without its classifier. Maps an image
// batch [N, 3, H, W] to feature maps [N, 1280, H/32, W/32].
//
//   stem      3x3 conv, stride 2, 32 channels
//   blocks    17 inverted residual blocks in 7 stages
//   head      1x1 conv to 1280 channels
//
// Every convolution is followed by BatchNorm and, except for the
// linear projection at the end of each block, ReLU6.
//
// Stage table (t = expansion, c = channels, n = repeats, s = stride):
//
//   t  c    n  s
//   1  16   1  1
//   6  24   2  2
//   6  32   3  2
//   6  64   4  2
//   6  96   3  1
//   6  160  3  2
//   6  320  1  1
//
// Parameter names follow the timm checkpoint layout so the
// ImageNet weights can be copied in tensor by tensor.
//
// Reference: Sandler et al. (2018) MobileNetV2

use anyhow::{Context, Result};
use burn::{
    module::{Param, RunningState},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
};

use crate::infra::weights_store::PretrainedWeights;

/// Channels produced by the final 1x1 convolution
pub const FEATURE_CHANNELS: usize = 1280;

const STEM_CHANNELS: usize = 32;

/// (expansion, output channels, repeats, first stride)
const STAGES: [(usize, usize, usize, usize); 7] = [
    (1, 16, 1, 1),
    (6, 24, 2, 2),
    (6, 32, 3, 2),
    (6, 64, 4, 2),
    (6, 96, 3, 1),
    (6, 160, 3, 2),
    (6, 320, 1, 1),
];

fn relu6<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.clamp(0.0, 6.0)
}

// ─── Conv + BatchNorm ─────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ConvBn<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn:   BatchNorm<B, 2>,
}

impl<B: Backend> ConvBn<B> {
    fn new(
        channels:   [usize; 2],
        kernel:     usize,
        stride:     usize,
        groups:     usize,
        bn_epsilon: f64,
        device:     &B::Device,
    ) -> Self {
        let pad  = kernel / 2;
        let conv = Conv2dConfig::new(channels, [kernel, kernel])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
            .with_groups(groups)
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(channels[1])
            .with_epsilon(bn_epsilon)
            .init(device);
        Self { conv, bn }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }

    /// Copy `<conv>.weight` and the four `<bn>.*` tensors in.
    fn load(
        mut self,
        weights: &mut PretrainedWeights,
        conv:    &str,
        bn:      &str,
        device:  &B::Device,
    ) -> Result<Self> {
        let conv_dims = self.conv.weight.dims();
        self.conv.weight = Param::from_tensor(
            take_tensor(weights, &format!("{conv}.weight"), conv_dims, device)?,
        );

        let bn_dims = self.bn.gamma.dims();
        self.bn.gamma = Param::from_tensor(
            take_tensor(weights, &format!("{bn}.weight"), bn_dims, device)?,
        );
        self.bn.beta = Param::from_tensor(
            take_tensor(weights, &format!("{bn}.bias"), bn_dims, device)?,
        );
        self.bn.running_mean = RunningState::new(
            take_tensor(weights, &format!("{bn}.running_mean"), bn_dims, device)?,
        );
        self.bn.running_var = RunningState::new(
            take_tensor(weights, &format!("{bn}.running_var"), bn_dims, device)?,
        );
        Ok(self)
    }
}

fn take_tensor<B: Backend, const D: usize>(
    weights: &mut PretrainedWeights,
    name:    &str,
    dims:    [usize; D],
    device:  &B::Device,
) -> Result<Tensor<B, D>> {
    let values = weights.take(name, &dims)?;
    Ok(Tensor::from_data(TensorData::new(values, dims), device))
}

// ─── Inverted Residual Block ──────────────────────────────────────────────────
// expand (1x1, skipped when t = 1) → depthwise 3x3 → linear project (1x1)
// The input is added back when the block keeps both stride and width.
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    pub expand:       Option<ConvBn<B>>,
    pub depthwise:    ConvBn<B>,
    pub project:      ConvBn<B>,
    pub in_channels:  usize,
    pub out_channels: usize,
    pub stride:       usize,
}

impl<B: Backend> InvertedResidual<B> {
    fn new(
        in_channels:  usize,
        out_channels: usize,
        stride:       usize,
        expansion:    usize,
        bn_epsilon:   f64,
        device:       &B::Device,
    ) -> Self {
        let hidden = in_channels * expansion;
        let expand = (expansion != 1)
            .then(|| ConvBn::new([in_channels, hidden], 1, 1, 1, bn_epsilon, device));
        let depthwise = ConvBn::new([hidden, hidden], 3, stride, hidden, bn_epsilon, device);
        let project   = ConvBn::new([hidden, out_channels], 1, 1, 1, bn_epsilon, device);
        Self { expand, depthwise, project, in_channels, out_channels, stride }
    }

    fn has_residual(&self) -> bool {
        self.stride == 1 && self.in_channels == self.out_channels
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = match &self.expand {
            Some(expand) => relu6(expand.forward(input.clone())),
            None         => input.clone(),
        };
        let x = relu6(self.depthwise.forward(x));
        let x = self.project.forward(x);

        if self.has_residual() { x + input } else { x }
    }

    /// The first block (no expansion) is a depthwise-separable
    /// conv in the checkpoint, with different member names.
    fn load(mut self, weights: &mut PretrainedWeights, prefix: &str, device: &B::Device) -> Result<Self> {
        match self.expand.take() {
            None => {
                self.depthwise = self.depthwise
                    .load(weights, &format!("{prefix}.conv_dw"), &format!("{prefix}.bn1"), device)?;
                self.project = self.project
                    .load(weights, &format!("{prefix}.conv_pw"), &format!("{prefix}.bn2"), device)?;
            }
            Some(expand) => {
                self.expand = Some(
                    expand.load(weights, &format!("{prefix}.conv_pw"), &format!("{prefix}.bn1"), device)?,
                );
                self.depthwise = self.depthwise
                    .load(weights, &format!("{prefix}.conv_dw"), &format!("{prefix}.bn2"), device)?;
                self.project = self.project
                    .load(weights, &format!("{prefix}.conv_pwl"), &format!("{prefix}.bn3"), device)?;
            }
        }
        Ok(self)
    }
}

// ─── Backbone ─────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct MobileNetV2Config {
    #[config(default = 1e-5)]
    pub bn_epsilon: f64,
}

impl MobileNetV2Config {
    /// Randomly initialised backbone; see `MobileNetV2::load_pretrained`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> MobileNetV2<B> {
        let stem = ConvBn::new([3, STEM_CHANNELS], 3, 2, 1, self.bn_epsilon, device);

        let mut stages   = Vec::with_capacity(STAGES.len());
        let mut channels = STEM_CHANNELS;
        for &(expansion, out_channels, repeats, first_stride) in &STAGES {
            let blocks: Vec<InvertedResidual<B>> = (0..repeats)
                .map(|i| {
                    let stride = if i == 0 { first_stride } else { 1 };
                    let in_ch  = if i == 0 { channels } else { out_channels };
                    InvertedResidual::new(in_ch, out_channels, stride, expansion, self.bn_epsilon, device)
                })
                .collect();
            stages.push(blocks);
            channels = out_channels;
        }

        let head = ConvBn::new([channels, FEATURE_CHANNELS], 1, 1, 1, self.bn_epsilon, device);
        MobileNetV2 { stem, stages, head }
    }
}

#[derive(Module, Debug)]
pub struct MobileNetV2<B: Backend> {
    pub stem:   ConvBn<B>,
    pub stages: Vec<Vec<InvertedResidual<B>>>,
    pub head:   ConvBn<B>,
}

impl<B: Backend> MobileNetV2<B> {
    /// images: [batch, 3, H, W] → features: [batch, 1280, H/32, W/32]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = relu6(self.stem.forward(images));
        for block in self.stages.iter().flatten() {
            x = block.forward(x);
        }
        relu6(self.head.forward(x))
    }

    pub fn block_count(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    /// Replace every parameter and running statistic with the
    /// checkpoint's. Missing tensors and shape mismatches are errors;
    /// checkpoint entries the backbone has no use for (the ImageNet
    /// classifier) are ignored.
    pub fn load_pretrained(self, mut weights: PretrainedWeights, device: &B::Device) -> Result<Self> {
        let MobileNetV2 { stem, stages, head } = self;

        let stem = stem
            .load(&mut weights, "conv_stem", "bn1", device)
            .context("Loading backbone stem")?;

        let mut loaded = Vec::with_capacity(stages.len());
        for (s, blocks) in stages.into_iter().enumerate() {
            let mut stage = Vec::with_capacity(blocks.len());
            for (i, block) in blocks.into_iter().enumerate() {
                let prefix = format!("blocks.{s}.{i}");
                let block  = block
                    .load(&mut weights, &prefix, device)
                    .with_context(|| format!("Loading backbone block {prefix}"))?;
                stage.push(block);
            }
            loaded.push(stage);
        }

        let head = head
            .load(&mut weights, "conv_head", "bn2", device)
            .context("Loading backbone head")?;

        let unused = weights.remaining();
        if !unused.is_empty() {
            tracing::debug!("Unused checkpoint tensors: {:?}", unused);
        }

        Ok(MobileNetV2 { stem, stages: loaded, head })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    /// A checkpoint holding every tensor the backbone asks for,
    /// filled with a constant, plus one classifier tensor it ignores.
    fn full_checkpoint(model: &MobileNetV2<TestBackend>) -> PretrainedWeights {
        fn conv_bn(w: &mut PretrainedWeights, layer: &ConvBn<TestBackend>, conv: &str, bn: &str) {
            let dims = layer.conv.weight.dims().to_vec();
            let n    = dims.iter().product();
            w.insert(format!("{conv}.weight"), dims, vec![0.01; n]);
            let [c] = layer.bn.gamma.dims();
            for (suffix, v) in [("weight", 1.0), ("bias", 0.0), ("running_mean", 0.0), ("running_var", 1.0)] {
                w.insert(format!("{bn}.{suffix}"), vec![c], vec![v; c]);
            }
        }

        let mut w = PretrainedWeights::new();
        conv_bn(&mut w, &model.stem, "conv_stem", "bn1");
        for (s, blocks) in model.stages.iter().enumerate() {
            for (i, block) in blocks.iter().enumerate() {
                let p = format!("blocks.{s}.{i}");
                match &block.expand {
                    None => {
                        conv_bn(&mut w, &block.depthwise, &format!("{p}.conv_dw"), &format!("{p}.bn1"));
                        conv_bn(&mut w, &block.project, &format!("{p}.conv_pw"), &format!("{p}.bn2"));
                    }
                    Some(expand) => {
                        conv_bn(&mut w, expand, &format!("{p}.conv_pw"), &format!("{p}.bn1"));
                        conv_bn(&mut w, &block.depthwise, &format!("{p}.conv_dw"), &format!("{p}.bn2"));
                        conv_bn(&mut w, &block.project, &format!("{p}.conv_pwl"), &format!("{p}.bn3"));
                    }
                }
            }
        }
        conv_bn(&mut w, &model.head, "conv_head", "bn2");
        w.insert("classifier.bias", vec![1000], vec![0.0; 1000]);
        w
    }

    #[test]
    fn test_block_layout() {
        let model = MobileNetV2Config::new().init::<TestBackend>(&Default::default());
        assert_eq!(model.block_count(), 17);
        assert!(model.stages[0][0].expand.is_none());
        assert!(model.stages[1][1].has_residual());
        assert!(!model.stages[1][0].has_residual());
        assert_eq!(model.stages[6][0].out_channels, 320);
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model  = MobileNetV2Config::new().init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 4>::zeros([2, 3, 64, 64], &device);
        assert_eq!(model.forward(images).dims(), [2, FEATURE_CHANNELS, 2, 2]);
    }

    #[test]
    fn test_load_pretrained_copies_values() {
        let device  = Default::default();
        let model   = MobileNetV2Config::new().init::<TestBackend>(&device);
        let weights = full_checkpoint(&model);

        let model = model.load_pretrained(weights, &device).unwrap();
        let stem: Vec<f32> = model.stem.conv.weight.val().into_data().to_vec().unwrap();
        assert!(stem.iter().all(|&v| (v - 0.01).abs() < 1e-7));

        let var: Vec<f32> = model.head.bn.running_var.value().into_data().to_vec().unwrap();
        assert!(var.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_load_pretrained_rejects_wrong_shape() {
        let device  = Default::default();
        let model   = MobileNetV2Config::new().init::<TestBackend>(&device);
        let mut weights = full_checkpoint(&model);
        weights.insert("conv_head.weight", vec![1280, 320], vec![0.0; 1280 * 320]);

        let err = model.load_pretrained(weights, &device).unwrap_err();
        assert!(format!("{err:#}").contains("conv_head.weight"));
    }

    #[test]
    fn test_load_pretrained_rejects_missing_tensor() {
        let device  = Default::default();
        let model   = MobileNetV2Config::new().init::<TestBackend>(&device);
        let mut weights = full_checkpoint(&model);
        let _ = weights.take("blocks.3.2.conv_dw.weight", &[384, 1, 3, 3]).unwrap();

        assert!(model.load_pretrained(weights, &device).is_err());
    }
}
