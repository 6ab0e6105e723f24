//! Training pipeline
//!
//! Fixed-schedule supervised training: every epoch runs a full shuffled
//! pass over the train partition followed by an ordered evaluation pass
//! over the test partition, with checkpointing and artifact generation
//! driven by the test accuracy.

pub mod config;
pub mod history;
pub mod run;

pub use config::TrainingConfig;
pub use history::{EpochRecord, History};
pub use run::{run_training, RunArgs, TrainingReport};
