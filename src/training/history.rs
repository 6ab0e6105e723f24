//! Epoch history accounting

use serde::{Deserialize, Serialize};

use crate::metrics::AccuracyTracker;

/// Metrics recorded for one epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    /// 1-based epoch number
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub test_loss: f64,
    pub test_accuracy: f64,
}

/// Accumulates epoch records and tracks the best test accuracy
#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<EpochRecord>,
    tracker: AccuracyTracker,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, returning true when its test accuracy meets or
    /// beats the best so far (ties re-trigger best-epoch side effects)
    pub fn push(&mut self, record: EpochRecord) -> bool {
        let is_best = self.tracker.update(record.epoch, record.test_accuracy);
        self.records.push(record);
        is_best
    }

    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    pub fn best_accuracy(&self) -> Option<f64> {
        self.tracker.best()
    }

    pub fn best_epoch(&self) -> usize {
        self.tracker.best_epoch()
    }
}
