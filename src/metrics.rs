//! Evaluation metrics
//!
//! Confusion-matrix accounting plus small running trackers used by the
//! training loop. The matrix stores raw counts row-major (rows = true
//! class, columns = predicted class); row normalization is computed on
//! demand for reporting.

use crate::{class_name, NUM_CLASSES};

/// Confusion matrix over the severity grades
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    /// Row-major counts, rows are true labels
    counts: Vec<usize>,
    num_classes: usize,
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::with_classes(NUM_CLASSES)
    }

    pub fn with_classes(num_classes: usize) -> Self {
        Self {
            counts: vec![0; num_classes * num_classes],
            num_classes,
        }
    }

    /// Build from aligned truth/prediction sequences
    pub fn from_predictions(truth: &[usize], predicted: &[usize]) -> Self {
        let mut matrix = Self::new();
        for (&t, &p) in truth.iter().zip(predicted) {
            matrix.add(t, p);
        }
        matrix
    }

    /// Record one observation
    pub fn add(&mut self, truth: usize, predicted: usize) {
        self.counts[truth * self.num_classes + predicted] += 1;
    }

    pub fn get(&self, truth: usize, predicted: usize) -> usize {
        self.counts[truth * self.num_classes + predicted]
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Total number of recorded observations
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Observations on the diagonal
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    /// Overall accuracy as a percentage
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.correct() as f64 * 100.0 / total as f64
    }

    /// Per-row observation counts (true-class support)
    pub fn row_sums(&self) -> Vec<usize> {
        (0..self.num_classes)
            .map(|t| (0..self.num_classes).map(|p| self.get(t, p)).sum())
            .collect()
    }

    /// Row-normalized matrix: each cell divided by its row's support.
    /// Empty rows stay all-zero.
    pub fn row_normalized(&self) -> Vec<Vec<f64>> {
        let sums = self.row_sums();
        (0..self.num_classes)
            .map(|t| {
                (0..self.num_classes)
                    .map(|p| {
                        if sums[t] == 0 {
                            0.0
                        } else {
                            self.get(t, p) as f64 / sums[t] as f64
                        }
                    })
                    .collect()
            })
            .collect()
    }

    /// Recall per class, None where the class has no support
    pub fn per_class_recall(&self) -> Vec<Option<f64>> {
        let sums = self.row_sums();
        (0..self.num_classes)
            .map(|t| {
                if sums[t] == 0 {
                    None
                } else {
                    Some(self.get(t, t) as f64 / sums[t] as f64)
                }
            })
            .collect()
    }
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Confusion matrix ({} samples):", self.total())?;
        for t in 0..self.num_classes {
            write!(f, "  {:>18}:", class_name(t))?;
            for p in 0..self.num_classes {
                write!(f, " {:>6}", self.get(t, p))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Tracks the best accuracy seen so far
#[derive(Debug, Clone, Default)]
pub struct AccuracyTracker {
    best: Option<f64>,
    best_epoch: usize,
}

impl AccuracyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an epoch's accuracy, returning true when it meets or beats
    /// the running best. Ties count so a later epoch matching the best
    /// still refreshes checkpoint-style side effects with its own state.
    pub fn update(&mut self, epoch: usize, accuracy: f64) -> bool {
        match self.best {
            Some(best) if accuracy < best => false,
            _ => {
                self.best = Some(accuracy);
                self.best_epoch = epoch;
                true
            }
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }
}

/// Running average over a stream of values
#[derive(Debug, Clone, Default)]
pub struct RunningAverage {
    sum: f64,
    count: usize,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}
