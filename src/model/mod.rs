//! Model architectures
//!
//! A residual convolutional backbone (18- or 50-layer variant) feeding a
//! linear classification head over the five severity grades.

pub mod classifier;
pub mod resnet;

pub use classifier::{RetinaClassifier, RetinaClassifierConfig};
pub use resnet::{Backbone, ResNet, ResNetConfig};
