//! Partition index loading
//!
//! Each partition is described by two one-column CSV files: an image-name
//! list and a label list, both with a header row. The loader zips them into
//! an ordered sample sequence. Missing files or mismatched lengths are
//! unrecoverable startup errors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, RetinaError};
use crate::NUM_CLASSES;

/// Dataset partition selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Partition {
    Train,
    Test,
}

impl Partition {
    /// Partition name as used in index file stems
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Test => "test",
        }
    }

    /// File name of the image-identifier list
    pub fn image_index_file(&self) -> String {
        format!("{}_img.csv", self.as_str())
    }

    /// File name of the label list
    pub fn label_index_file(&self) -> String {
        format!("{}_label.csv", self.as_str())
    }

    /// Whether the randomized training pipeline applies to this partition
    pub fn is_train(&self) -> bool {
        matches!(self, Partition::Train)
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single sample: image identifier plus ground-truth severity grade.
/// Immutable once loaded from the index files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Image identifier (file stem, e.g. "10_left")
    pub id: String,
    /// Severity label in [0, NUM_CLASSES)
    pub label: usize,
}

/// Load the ordered sample sequence for a partition.
///
/// Reads `{partition}_img.csv` and `{partition}_label.csv` from `dir` and
/// zips them. Fails if either file is missing, if the two lists differ in
/// length, or if any label falls outside `[0, NUM_CLASSES)`.
pub fn load_partition<P: AsRef<Path>>(dir: P, partition: Partition) -> Result<Vec<Sample>> {
    let dir = dir.as_ref();
    let ids = read_column(&dir.join(partition.image_index_file()))?;
    let labels = read_column(&dir.join(partition.label_index_file()))?;

    if ids.len() != labels.len() {
        return Err(RetinaError::IndexMismatch {
            partition: partition.as_str().to_string(),
            images: ids.len(),
            labels: labels.len(),
        });
    }

    let mut samples = Vec::with_capacity(ids.len());
    for (id, raw) in ids.into_iter().zip(labels) {
        let label: i64 = raw.trim().parse().map_err(|_| RetinaError::LabelOutOfRange {
            id: id.clone(),
            label: -1,
            num_classes: NUM_CLASSES,
        })?;
        if label < 0 || label as usize >= NUM_CLASSES {
            return Err(RetinaError::LabelOutOfRange {
                id,
                label,
                num_classes: NUM_CLASSES,
            });
        }
        samples.push(Sample {
            id,
            label: label as usize,
        });
    }

    info!("Loaded {} samples for partition '{}'", samples.len(), partition);
    Ok(samples)
}

/// Per-class sample counts for a loaded partition
pub fn class_counts(samples: &[Sample]) -> Vec<usize> {
    let mut counts = vec![0usize; NUM_CLASSES];
    for sample in samples {
        counts[sample.label] += 1;
    }
    counts
}

/// Read a one-column CSV file with a header row into its value column
fn read_column(path: &PathBuf) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(RetinaError::MissingIndex(path.clone()));
    }

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(field) = record.get(0) {
            values.push(field.to_string());
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_index(dir: &Path, name: &str, header: &str, rows: &[&str]) {
        let mut content = String::from(header);
        content.push('\n');
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(dir.join(name), content).unwrap();
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("retina_index_{}_{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_partition() {
        let dir = temp_dir("ok");
        write_index(&dir, "train_img.csv", "image", &["10_left", "10_right", "13_left"]);
        write_index(&dir, "train_label.csv", "level", &["0", "4", "2"]);

        let samples = load_partition(&dir, Partition::Train).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], Sample { id: "10_left".to_string(), label: 0 });
        assert_eq!(samples[1].label, 4);
        assert_eq!(samples[2].id, "13_left");
    }

    #[test]
    fn test_images_and_labels_equal_length() {
        let dir = temp_dir("len");
        write_index(&dir, "test_img.csv", "image", &["a", "b"]);
        write_index(&dir, "test_label.csv", "level", &["1", "1"]);

        let samples = load_partition(&dir, Partition::Test).unwrap();
        let counts = class_counts(&samples);
        assert_eq!(counts.iter().sum::<usize>(), samples.len());
    }

    #[test]
    fn test_mismatched_lengths_fail() {
        let dir = temp_dir("mismatch");
        write_index(&dir, "train_img.csv", "image", &["a", "b", "c"]);
        write_index(&dir, "train_label.csv", "level", &["0", "1"]);

        let err = load_partition(&dir, Partition::Train).unwrap_err();
        assert!(matches!(err, RetinaError::IndexMismatch { images: 3, labels: 2, .. }));
    }

    #[test]
    fn test_missing_index_fails() {
        let dir = temp_dir("missing");
        let err = load_partition(&dir, Partition::Test).unwrap_err();
        assert!(matches!(err, RetinaError::MissingIndex(_)));
    }

    #[test]
    fn test_label_out_of_range_fails() {
        let dir = temp_dir("range");
        write_index(&dir, "train_img.csv", "image", &["a"]);
        write_index(&dir, "train_label.csv", "level", &["5"]);

        let err = load_partition(&dir, Partition::Train).unwrap_err();
        assert!(matches!(err, RetinaError::LabelOutOfRange { label: 5, .. }));
    }

    #[test]
    fn test_partition_file_names() {
        assert_eq!(Partition::Train.image_index_file(), "train_img.csv");
        assert_eq!(Partition::Test.label_index_file(), "test_label.csv");
        assert!(Partition::Train.is_train());
        assert!(!Partition::Test.is_train());
    }
}
