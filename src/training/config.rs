//! Training hyperparameters

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::IMAGE_SIZE;

/// Hyperparameters for a training run. The defaults are the full
/// fixed-schedule configuration; `quick_test` shrinks the run for
/// smoke-testing the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of full train/eval passes
    pub epochs: usize,
    /// Samples per batch
    pub batch_size: usize,
    /// SGD learning rate
    pub learning_rate: f64,
    /// SGD momentum factor
    pub momentum: f64,
    /// L2 weight decay penalty
    pub weight_decay: f64,
    /// Seed for shuffling, augmentation and weight init
    pub seed: u64,
    /// Rayon threads decoding images
    pub num_workers: usize,
    /// Side length images are cropped to
    pub image_size: u32,
    /// Test accuracy (percent) a new best must exceed before a
    /// checkpoint and confusion matrix are written
    pub checkpoint_accuracy_threshold: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 4,
            learning_rate: 8e-4,
            momentum: 0.9,
            weight_decay: 5e-4,
            seed: 42,
            num_workers: 4,
            image_size: IMAGE_SIZE,
            checkpoint_accuracy_threshold: 80.0,
        }
    }
}

impl TrainingConfig {
    /// Shrunk configuration for pipeline smoke tests
    pub fn quick_test() -> Self {
        Self {
            epochs: 2,
            batch_size: 2,
            image_size: 64,
            checkpoint_accuracy_threshold: 0.0,
            ..Self::default()
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
