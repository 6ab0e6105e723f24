//! Severity classifier
//!
//! Residual backbone plus a linear head producing one logit per severity
//! grade. The head replaces the thousand-way layer the backbone would carry
//! for generic image classification.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::record::{CompactRecorder, RecorderError};

use super::resnet::{Backbone, ResNet, ResNetConfig};
use crate::NUM_CLASSES;

/// Classifier configuration
#[derive(Config, Debug)]
pub struct RetinaClassifierConfig {
    pub backbone: Backbone,
    #[config(default = "NUM_CLASSES")]
    pub num_classes: usize,
}

impl RetinaClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RetinaClassifier<B> {
        RetinaClassifier {
            features: ResNetConfig::new(self.backbone).init(device),
            head: LinearConfig::new(self.backbone.feature_dim(), self.num_classes).init(device),
            num_classes: self.num_classes,
        }
    }
}

/// Full model: backbone features into a linear grade head
#[derive(Module, Debug)]
pub struct RetinaClassifier<B: Backend> {
    features: ResNet<B>,
    head: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> RetinaClassifier<B> {
    /// Build a classifier over the default grade count
    pub fn new(backbone: Backbone, device: &B::Device) -> Self {
        RetinaClassifierConfig::new(backbone).init(device)
    }

    /// Forward pass, [batch, 3, H, W] -> [batch, num_classes] logits
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head.forward(self.features.forward(images))
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Replace this model's weights with a previously saved record
    pub fn load_weights(
        self,
        path: &std::path::Path,
        device: &B::Device,
    ) -> Result<Self, RecorderError> {
        self.load_file(path.to_path_buf(), &CompactRecorder::new(), device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;

    type B = DefaultBackend;

    #[test]
    fn test_logit_shape() {
        let device = Default::default();
        let model: RetinaClassifier<B> =
            RetinaClassifierConfig::new(Backbone::ResNet18).init(&device);
        let input = Tensor::<B, 4>::zeros([2, 3, 64, 64], &device);
        let logits = model.forward(input);
        assert_eq!(logits.dims(), [2, NUM_CLASSES]);
    }

    #[test]
    fn test_single_image_logits() {
        let device = Default::default();
        let model = RetinaClassifier::<B>::new(Backbone::ResNet18, &device);
        let input = Tensor::<B, 4>::ones([1, 3, 64, 64], &device);
        let logits = model.forward(input);
        assert_eq!(logits.dims(), [1, NUM_CLASSES]);
        assert_eq!(model.num_classes(), NUM_CLASSES);
    }

    #[test]
    fn test_bottleneck_logit_shape() {
        let device = Default::default();
        let model = RetinaClassifier::<B>::new(Backbone::ResNet50, &device);
        let input = Tensor::<B, 4>::zeros([2, 3, 64, 64], &device);
        assert_eq!(model.forward(input).dims(), [2, NUM_CLASSES]);
    }

    #[test]
    fn test_config_defaults() {
        let config = RetinaClassifierConfig::new(Backbone::ResNet50);
        assert_eq!(config.num_classes, NUM_CLASSES);
    }
}
