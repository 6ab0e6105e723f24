//! Logging setup and training progress output
//!
//! Structured logging goes through tracing; the `TrainingLogger` wraps the
//! per-epoch progress lines so the training loop stays free of formatting
//! noise.

use colored::Colorize;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use crate::class_name;
use crate::metrics::ConfusionMatrix;

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Debug,
}

impl LogLevel {
    fn as_tracing(&self) -> Level {
        match self {
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
        }
    }
}

/// Initialize the global tracing subscriber. Call once at startup.
pub fn init_logging(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_max_level(level.as_tracing())
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .compact()
        .init();
}

/// Epoch-level progress reporting for a training run
pub struct TrainingLogger {
    total_epochs: usize,
    epoch_start: std::time::Instant,
    run_start: std::time::Instant,
}

impl TrainingLogger {
    pub fn new(total_epochs: usize) -> Self {
        let now = std::time::Instant::now();
        Self {
            total_epochs,
            epoch_start: now,
            run_start: now,
        }
    }

    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch_start = std::time::Instant::now();
        info!(
            "{}",
            format!("Epoch {}/{}", epoch, self.total_epochs).bold()
        );
    }

    pub fn end_epoch(
        &self,
        train_loss: f64,
        train_accuracy: f64,
        test_loss: f64,
        test_accuracy: f64,
    ) {
        let elapsed = self.epoch_start.elapsed();
        info!(
            "  train: loss {:.4}, acc {:.2}% | test: loss {:.4}, acc {:.2}% | {:.1}s",
            train_loss,
            train_accuracy,
            test_loss,
            test_accuracy,
            elapsed.as_secs_f64()
        );
    }

    pub fn log_new_best(&self, epoch: usize, accuracy: f64) {
        info!(
            "  {} test accuracy {:.2}% at epoch {}",
            "new best".green().bold(),
            accuracy,
            epoch
        );
    }

    pub fn log_checkpoint(&self, path: &std::path::Path) {
        info!("  checkpoint saved to {}", path.display());
    }

    /// Per-grade recall of the best epoch's confusion matrix
    pub fn log_per_class_recall(&self, matrix: &ConfusionMatrix) {
        for (grade, recall) in matrix.per_class_recall().iter().enumerate() {
            match recall {
                Some(r) => info!("  {:>18}: recall {:.2}%", class_name(grade), r * 100.0),
                None => info!("  {:>18}: no test samples", class_name(grade)),
            }
        }
    }

    pub fn log_complete(&self, best_accuracy: f64, best_epoch: usize) {
        let elapsed = self.run_start.elapsed();
        info!(
            "{} best test accuracy {:.2}% (epoch {}), total {:.1}s",
            "Training complete:".bold(),
            best_accuracy,
            best_epoch,
            elapsed.as_secs_f64()
        );
    }
}
