//! Dataset module for fundus-photograph handling
//!
//! This module provides:
//! - Index-file loading mapping image identifiers to severity labels
//! - Preprocessing and augmentation pipelines (deterministic for test,
//!   randomized for train)
//! - Burn `Dataset`/`Batcher` integration with ImageNet normalization
//! - Epoch batch planning (shuffled for train, ordered for test)

pub mod augment;
pub mod batches;
pub mod fundus;
pub mod index;

pub use batches::EpochBatches;
pub use fundus::{FundusBatch, FundusBatcher, FundusDataset, FundusItem};
pub use index::{load_partition, Partition, Sample};
