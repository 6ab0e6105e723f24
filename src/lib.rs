//! # Retinopathy
//!
//! A Rust library for diabetic-retinopathy severity grading from fundus
//! photographs using the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: index-file loading, image preprocessing and augmentation,
//!   Burn dataset/batcher integration
//! - `model`: ResNet-style backbones with a linear grading head
//! - `training`: fixed-epoch train/eval loop, metrics history, checkpoints
//! - `metrics`: confusion matrix and accuracy accounting
//! - `report`: confusion-matrix and accuracy-curve rendering, CSV export
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use retinopathy::backend::{default_device, TrainingBackend};
//! use retinopathy::model::Backbone;
//! use retinopathy::training::{run_training, RunArgs, TrainingConfig};
//!
//! let args = RunArgs {
//!     data_dir: "data".into(),
//!     image_root: "data/images".into(),
//!     output_dir: "output".into(),
//!     backbone: Backbone::ResNet18,
//!     weights: None,
//!     config: TrainingConfig::default(),
//! };
//! let report = run_training::<TrainingBackend>(&args, default_device())?;
//! println!("best test accuracy: {:.2}%", report.best_accuracy);
//! ```

pub mod backend;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod report;
pub mod training;

pub use dataset::index::{load_partition, Partition, Sample};
pub use dataset::{FundusBatch, FundusBatcher, FundusDataset, FundusItem};
pub use error::{Result, RetinaError};
pub use metrics::{AccuracyTracker, ConfusionMatrix, RunningAverage};
pub use model::{Backbone, RetinaClassifier};
pub use training::{run_training, EpochRecord, RunArgs, TrainingConfig, TrainingReport};

/// Retinopathy severity grades (international clinical scale)
pub const NUM_CLASSES: usize = 5;

/// Side length of preprocessed fundus images
pub const IMAGE_SIZE: u32 = 512;

/// ImageNet per-channel mean, applied to both pipelines
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet per-channel standard deviation
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Severity class names, indexed by label
pub const CLASS_NAMES: [&str; 5] = [
    "No DR",
    "Mild",
    "Moderate",
    "Severe",
    "Proliferative DR",
];

/// Get the class name for a label index
pub fn class_name(label: usize) -> &'static str {
    CLASS_NAMES.get(label).copied().unwrap_or("Unknown")
}

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
