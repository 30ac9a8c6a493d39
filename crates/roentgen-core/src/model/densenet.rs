//! DenseNet-121 backbone with a multi-label classification head.
//!
//! Parameter names mirror the torchvision layout (`features.conv0`,
//! `features.denseblock1.denselayer1.norm1`, `classifier.0`, ...) under a
//! `densenet121` root, so trained checkpoints bind by name with no renaming
//! beyond the loader's key normalization.

use candle_core::{Result, Tensor, D};
use candle_nn::{
    batch_norm, conv2d_no_bias, linear, BatchNorm, Conv2d, Conv2dConfig, Linear, Module, ModuleT,
    VarBuilder,
};

/// Channels added by each dense layer.
const GROWTH_RATE: usize = 32;

/// Bottleneck width multiplier for the 1×1 convolutions.
const BOTTLENECK_FACTOR: usize = 4;

/// Channels produced by the stem convolution.
const INIT_FEATURES: usize = 64;

/// Dense layers per block, in network order.
const BLOCK_LAYERS: [usize; 4] = [6, 12, 24, 16];

const BN_EPS: f64 = 1e-5;

/// norm1 → relu → conv1 (1×1) → norm2 → relu → conv2 (3×3); the caller
/// concatenates the 32-channel output onto its running feature map.
#[derive(Debug)]
struct DenseLayer {
    norm1: BatchNorm,
    conv1: Conv2d,
    norm2: BatchNorm,
    conv2: Conv2d,
}

impl DenseLayer {
    fn new(in_channels: usize, vb: VarBuilder) -> Result<Self> {
        let bottleneck = BOTTLENECK_FACTOR * GROWTH_RATE;
        let norm1 = batch_norm(in_channels, BN_EPS, vb.pp("norm1"))?;
        let conv1 = conv2d_no_bias(
            in_channels,
            bottleneck,
            1,
            Conv2dConfig::default(),
            vb.pp("conv1"),
        )?;
        let norm2 = batch_norm(bottleneck, BN_EPS, vb.pp("norm2"))?;
        let conv2 = conv2d_no_bias(
            bottleneck,
            GROWTH_RATE,
            3,
            Conv2dConfig {
                padding: 1,
                ..Default::default()
            },
            vb.pp("conv2"),
        )?;
        Ok(Self {
            norm1,
            conv1,
            norm2,
            conv2,
        })
    }

    fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = self.norm1.forward_t(xs, train)?.relu()?;
        let xs = self.conv1.forward(&xs)?;
        let xs = self.norm2.forward_t(&xs, train)?.relu()?;
        self.conv2.forward(&xs)
    }
}

#[derive(Debug)]
struct DenseBlock {
    layers: Vec<DenseLayer>,
}

impl DenseBlock {
    fn new(in_channels: usize, num_layers: usize, vb: VarBuilder) -> Result<Self> {
        let mut layers = Vec::with_capacity(num_layers);
        for i in 0..num_layers {
            layers.push(DenseLayer::new(
                in_channels + i * GROWTH_RATE,
                vb.pp(format!("denselayer{}", i + 1)),
            )?);
        }
        Ok(Self { layers })
    }

    fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut features = xs.clone();
        for layer in &self.layers {
            let new = layer.forward(&features, train)?;
            features = Tensor::cat(&[&features, &new], 1)?;
        }
        Ok(features)
    }
}

/// Compression step between dense blocks: halves channels, halves the
/// spatial resolution.
#[derive(Debug)]
struct Transition {
    norm: BatchNorm,
    conv: Conv2d,
}

impl Transition {
    fn new(in_channels: usize, out_channels: usize, vb: VarBuilder) -> Result<Self> {
        let norm = batch_norm(in_channels, BN_EPS, vb.pp("norm"))?;
        let conv = conv2d_no_bias(
            in_channels,
            out_channels,
            1,
            Conv2dConfig::default(),
            vb.pp("conv"),
        )?;
        Ok(Self { norm, conv })
    }

    fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = self.norm.forward_t(xs, train)?.relu()?;
        let xs = self.conv.forward(&xs)?;
        xs.avg_pool2d(2)
    }
}

/// DenseNet-121 feature extractor plus a `num_classes`-way head squashed
/// per-unit: each output is an independent probability (multi-label, not
/// softmax).
#[derive(Debug)]
pub struct DenseNet121 {
    conv0: Conv2d,
    norm0: BatchNorm,
    blocks: Vec<DenseBlock>,
    transitions: Vec<Transition>,
    norm5: BatchNorm,
    classifier: Linear,
}

impl DenseNet121 {
    pub fn new(num_classes: usize, vb: VarBuilder) -> Result<Self> {
        let vb = vb.pp("densenet121");
        let fp = vb.pp("features");

        let conv0 = conv2d_no_bias(
            3,
            INIT_FEATURES,
            7,
            Conv2dConfig {
                padding: 3,
                stride: 2,
                ..Default::default()
            },
            fp.pp("conv0"),
        )?;
        let norm0 = batch_norm(INIT_FEATURES, BN_EPS, fp.pp("norm0"))?;

        let mut blocks = Vec::with_capacity(BLOCK_LAYERS.len());
        let mut transitions = Vec::with_capacity(BLOCK_LAYERS.len() - 1);
        let mut channels = INIT_FEATURES;
        for (i, &num_layers) in BLOCK_LAYERS.iter().enumerate() {
            blocks.push(DenseBlock::new(
                channels,
                num_layers,
                fp.pp(format!("denseblock{}", i + 1)),
            )?);
            channels += num_layers * GROWTH_RATE;
            if i + 1 < BLOCK_LAYERS.len() {
                transitions.push(Transition::new(
                    channels,
                    channels / 2,
                    fp.pp(format!("transition{}", i + 1)),
                )?);
                channels /= 2;
            }
        }

        let norm5 = batch_norm(channels, BN_EPS, fp.pp("norm5"))?;
        // The trained head is Sequential(Linear, Sigmoid); the linear layer
        // sits at index 0 and the sigmoid has no parameters.
        let classifier = linear(channels, num_classes, vb.pp("classifier").pp("0"))?;

        Ok(Self {
            conv0,
            norm0,
            blocks,
            transitions,
            norm5,
            classifier,
        })
    }

    /// Per-label probabilities for a `[batch, 3, H, W]` input.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = self.conv0.forward(xs)?;
        let xs = self.norm0.forward_t(&xs, train)?.relu()?;
        // Candle pooling takes no padding argument; zero padding is exact
        // here since the ReLU output is non-negative.
        let xs = xs.pad_with_zeros(2, 1, 1)?.pad_with_zeros(3, 1, 1)?;
        let mut xs = xs.max_pool2d_with_stride(3, 2)?;

        for (i, block) in self.blocks.iter().enumerate() {
            xs = block.forward(&xs, train)?;
            if let Some(transition) = self.transitions.get(i) {
                xs = transition.forward(&xs, train)?;
            }
        }

        let xs = self.norm5.forward_t(&xs, train)?.relu()?;
        // Global average pool over the spatial dims.
        let xs = xs.mean(D::Minus1)?.mean(D::Minus1)?;
        let logits = self.classifier.forward(&xs)?;
        candle_nn::ops::sigmoid(&logits)
    }
}
