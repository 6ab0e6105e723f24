//! Error types
//!
//! Custom error types for dataset and training failures, defined with
//! thiserror. Index-file problems are unrecoverable startup errors; the
//! binary reports them through anyhow with context.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for retinopathy operations
#[derive(Error, Debug)]
pub enum RetinaError {
    /// An index file for a partition is missing
    #[error("index file not found: {0}")]
    MissingIndex(PathBuf),

    /// The image list and label list for a partition disagree in length
    #[error("partition '{partition}' has {images} image names but {labels} labels")]
    IndexMismatch {
        partition: String,
        images: usize,
        labels: usize,
    },

    /// A label outside [0, num_classes) was read from an index file
    #[error("label {label} out of range for {num_classes} classes (image '{id}')")]
    LabelOutOfRange {
        id: String,
        label: i64,
        num_classes: usize,
    },

    /// Error decoding or preprocessing an image
    #[error("failed to load image '{0}': {1}")]
    Image(PathBuf, String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Index-file parse error
    #[error("index parse error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration serialization error
    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result type for retinopathy operations
pub type Result<T> = std::result::Result<T, RetinaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RetinaError::IndexMismatch {
            partition: "train".to_string(),
            images: 10,
            labels: 9,
        };
        assert_eq!(
            format!("{}", err),
            "partition 'train' has 10 image names but 9 labels"
        );
    }

    #[test]
    fn test_label_out_of_range_display() {
        let err = RetinaError::LabelOutOfRange {
            id: "10_left".to_string(),
            label: 7,
            num_classes: 5,
        };
        assert!(format!("{}", err).contains("10_left"));
        assert!(format!("{}", err).contains("7"));
    }
}
