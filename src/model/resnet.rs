//! Residual convolutional backbone
//!
//! Standard residual topology: a 7x7/2 stem with 3x3/2 max pooling, four
//! stages of residual blocks, then global average pooling down to a flat
//! feature vector. The 18-layer variant stacks two-conv basic blocks; the
//! 50-layer variant stacks three-conv bottleneck blocks with 4x channel
//! expansion. Convolutions are bias-free since every one is followed by a
//! batch norm.

use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Backbone depth selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backbone {
    /// 18-layer residual network, basic blocks
    #[value(name = "resnet18")]
    ResNet18,
    /// 50-layer residual network, bottleneck blocks
    #[value(name = "resnet50")]
    ResNet50,
}

impl Backbone {
    /// Blocks per stage
    pub fn layer_plan(&self) -> [usize; 4] {
        match self {
            Backbone::ResNet18 => [2, 2, 2, 2],
            Backbone::ResNet50 => [3, 4, 6, 3],
        }
    }

    /// Whether stages use three-conv bottleneck blocks
    pub fn bottleneck(&self) -> bool {
        matches!(self, Backbone::ResNet50)
    }

    /// Channel expansion applied to each block's output
    pub fn expansion(&self) -> usize {
        if self.bottleneck() {
            4
        } else {
            1
        }
    }

    /// Width of the pooled feature vector
    pub fn feature_dim(&self) -> usize {
        512 * self.expansion()
    }

    /// Name used for output file stems
    pub fn model_name(&self) -> &'static str {
        match self {
            Backbone::ResNet18 => "ResNet18",
            Backbone::ResNet50 => "ResNet50",
        }
    }
}

impl std::fmt::Display for Backbone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.model_name())
    }
}

/// Projection shortcut for blocks that change shape
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([in_channels, out_channels], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .init(device),
            bn: BatchNormConfig::new(out_channels).init(device),
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(input))
    }
}

/// One residual block. Basic blocks hold two convolutions, bottleneck
/// blocks hold three; the residual add happens before the final activation.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    convs: Vec<Conv2d<B>>,
    bns: Vec<BatchNorm<B, 2>>,
    downsample: Option<Downsample<B>>,
    relu: Relu,
}

impl<B: Backend> ResidualBlock<B> {
    fn basic(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let convs = vec![
            conv3x3(in_channels, out_channels, stride, device),
            conv3x3(out_channels, out_channels, 1, device),
        ];
        let bns = vec![
            BatchNormConfig::new(out_channels).init(device),
            BatchNormConfig::new(out_channels).init(device),
        ];
        let downsample = (stride != 1 || in_channels != out_channels)
            .then(|| Downsample::new(in_channels, out_channels, stride, device));
        Self {
            convs,
            bns,
            downsample,
            relu: Relu::new(),
        }
    }

    fn bottleneck(
        in_channels: usize,
        mid_channels: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let out_channels = mid_channels * 4;
        let convs = vec![
            conv1x1(in_channels, mid_channels, 1, device),
            conv3x3(mid_channels, mid_channels, stride, device),
            conv1x1(mid_channels, out_channels, 1, device),
        ];
        let bns = vec![
            BatchNormConfig::new(mid_channels).init(device),
            BatchNormConfig::new(mid_channels).init(device),
            BatchNormConfig::new(out_channels).init(device),
        ];
        let downsample = (stride != 1 || in_channels != out_channels)
            .then(|| Downsample::new(in_channels, out_channels, stride, device));
        Self {
            convs,
            bns,
            downsample,
            relu: Relu::new(),
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let shortcut = match &self.downsample {
            Some(projection) => projection.forward(input.clone()),
            None => input.clone(),
        };

        let last = self.convs.len() - 1;
        let mut x = input;
        for (i, (conv, bn)) in self.convs.iter().zip(&self.bns).enumerate() {
            x = bn.forward(conv.forward(x));
            if i < last {
                x = self.relu.forward(x);
            }
        }
        self.relu.forward(x + shortcut)
    }
}

/// Backbone configuration
#[derive(Config, Debug)]
pub struct ResNetConfig {
    pub backbone: Backbone,
}

impl ResNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        let plan = self.backbone.layer_plan();
        let bottleneck = self.backbone.bottleneck();
        let expansion = self.backbone.expansion();

        let mut blocks = Vec::new();
        let mut in_channels = 64;
        for (stage, &depth) in plan.iter().enumerate() {
            let width = 64 << stage;
            for block in 0..depth {
                let stride = if stage > 0 && block == 0 { 2 } else { 1 };
                let built = if bottleneck {
                    ResidualBlock::bottleneck(in_channels, width, stride, device)
                } else {
                    ResidualBlock::basic(in_channels, width, stride, device)
                };
                blocks.push(built);
                in_channels = width * expansion;
            }
        }

        ResNet {
            stem_conv: Conv2dConfig::new([3, 64], [7, 7])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_bias(false)
                .init(device),
            stem_bn: BatchNormConfig::new(64).init(device),
            stem_pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            blocks,
            avg_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            relu: Relu::new(),
        }
    }
}

/// Residual feature extractor, [batch, 3, H, W] -> [batch, feature_dim]
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    stem_conv: Conv2d<B>,
    stem_bn: BatchNorm<B, 2>,
    stem_pool: MaxPool2d,
    blocks: Vec<ResidualBlock<B>>,
    avg_pool: AdaptiveAvgPool2d,
    relu: Relu,
}

impl<B: Backend> ResNet<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = self.relu.forward(self.stem_bn.forward(self.stem_conv.forward(images)));
        x = self.stem_pool.forward(x);
        for block in &self.blocks {
            x = block.forward(x);
        }
        let pooled = self.avg_pool.forward(x);
        pooled.flatten(1, 3)
    }
}

fn conv3x3<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_bias(false)
        .init(device)
}

fn conv1x1<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [1, 1])
        .with_stride([stride, stride])
        .with_bias(false)
        .init(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;

    type B = DefaultBackend;

    #[test]
    fn test_backbone_properties() {
        assert_eq!(Backbone::ResNet18.layer_plan(), [2, 2, 2, 2]);
        assert_eq!(Backbone::ResNet50.layer_plan(), [3, 4, 6, 3]);
        assert_eq!(Backbone::ResNet18.feature_dim(), 512);
        assert_eq!(Backbone::ResNet50.feature_dim(), 2048);
        assert_eq!(Backbone::ResNet18.model_name(), "ResNet18");
        assert!(!Backbone::ResNet18.bottleneck());
        assert!(Backbone::ResNet50.bottleneck());
    }

    #[test]
    fn test_resnet18_feature_shape() {
        let device = Default::default();
        let model: ResNet<B> = ResNetConfig::new(Backbone::ResNet18).init(&device);
        let input = Tensor::<B, 4>::zeros([2, 3, 64, 64], &device);
        let features = model.forward(input);
        assert_eq!(features.dims(), [2, 512]);
    }

    #[test]
    fn test_resnet50_feature_shape() {
        let device = Default::default();
        let model: ResNet<B> = ResNetConfig::new(Backbone::ResNet50).init(&device);
        let input = Tensor::<B, 4>::zeros([1, 3, 64, 64], &device);
        let features = model.forward(input);
        assert_eq!(features.dims(), [1, 2048]);
    }

    #[test]
    fn test_block_count_matches_plan() {
        let device = Default::default();
        let model: ResNet<B> = ResNetConfig::new(Backbone::ResNet18).init(&device);
        assert_eq!(model.blocks.len(), 8);
        let model: ResNet<B> = ResNetConfig::new(Backbone::ResNet50).init(&device);
        assert_eq!(model.blocks.len(), 16);
    }
}
