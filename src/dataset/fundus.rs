//! Burn dataset and batcher for fundus photographs
//!
//! `FundusDataset` decodes images lazily at access time: every `load` call
//! reads the file, applies the geometry stage and, for the train partition,
//! the randomized transforms. Augmentation randomness is derived from
//! (seed, epoch, index) so parallel decoding stays deterministic while the
//! draws still change every epoch. The batcher stacks decoded items and
//! applies ImageNet channel normalization on-device.

use std::path::{Path, PathBuf};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use burn::tensor::TensorData;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::augment::{augment_train, center_crop, resize_shorter_side, to_chw_floats};
use super::index::{Partition, Sample};
use crate::error::{Result, RetinaError};
use crate::{IMAGENET_MEAN, IMAGENET_STD};

/// A decoded sample: planar CHW floats in [0, 1] plus its label
#[derive(Debug, Clone)]
pub struct FundusItem {
    /// Pixel data, length 3 * image_size * image_size
    pub image: Vec<f32>,
    /// Severity grade in [0, NUM_CLASSES)
    pub label: usize,
    /// Source file, kept for error reporting
    pub path: PathBuf,
}

/// Lazily-decoding fundus image dataset for one partition
pub struct FundusDataset {
    root: PathBuf,
    samples: Vec<Sample>,
    partition: Partition,
    image_size: u32,
    seed: u64,
    epoch: usize,
}

impl FundusDataset {
    pub fn new<P: AsRef<Path>>(
        root: P,
        samples: Vec<Sample>,
        partition: Partition,
        image_size: u32,
        seed: u64,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            samples,
            partition,
            image_size,
            seed,
            epoch: 0,
        }
    }

    /// Advance the augmentation epoch so training draws fresh transforms
    pub fn set_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// Ground-truth labels in dataset order
    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Path of the image file backing sample `index`
    pub fn image_path(&self, index: usize) -> PathBuf {
        self.root.join(format!("{}.jpeg", self.samples[index].id))
    }

    /// Decode and preprocess the sample at `index`.
    ///
    /// Unreadable or undecodable files are reported as errors rather than
    /// skipped, since a silently shrinking dataset would corrupt the
    /// accuracy denominators.
    pub fn load(&self, index: usize) -> Result<FundusItem> {
        let path = self.image_path(index);
        let decoded = image::open(&path)
            .map_err(|e| RetinaError::Image(path.clone(), e.to_string()))?;

        let resized = resize_shorter_side(&decoded, self.image_size);
        let square = center_crop(&resized, self.image_size);

        let finished = if self.partition.is_train() {
            let mut rng = self.item_rng(index);
            augment_train(&square, &mut rng)
        } else {
            square
        };

        Ok(FundusItem {
            image: to_chw_floats(&finished),
            label: self.samples[index].label,
            path,
        })
    }

    fn item_rng(&self, index: usize) -> ChaCha8Rng {
        let stream = self
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add((self.epoch as u64) << 32)
            .wrapping_add(index as u64);
        ChaCha8Rng::seed_from_u64(stream)
    }
}

impl Dataset<Result<FundusItem>> for FundusDataset {
    fn get(&self, index: usize) -> Option<Result<FundusItem>> {
        if index >= self.samples.len() {
            return None;
        }
        Some(self.load(index))
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of normalized images and their target labels
#[derive(Debug, Clone)]
pub struct FundusBatch<B: Backend> {
    /// Normalized images, shape [batch, 3, size, size]
    pub images: Tensor<B, 4>,
    /// Target labels, shape [batch]
    pub targets: Tensor<B, 1, Int>,
}

/// Stacks decoded items into tensors and applies ImageNet normalization
#[derive(Debug, Clone)]
pub struct FundusBatcher {
    image_size: usize,
}

impl FundusBatcher {
    pub fn new(image_size: u32) -> Self {
        Self {
            image_size: image_size as usize,
        }
    }
}

impl<B: Backend> Batcher<B, FundusItem, FundusBatch<B>> for FundusBatcher {
    fn batch(&self, items: Vec<FundusItem>, device: &B::Device) -> FundusBatch<B> {
        let batch = items.len();
        let size = self.image_size;

        let mut pixels = Vec::with_capacity(batch * 3 * size * size);
        let mut labels = Vec::with_capacity(batch);
        for item in items {
            debug_assert_eq!(item.image.len(), 3 * size * size);
            pixels.extend_from_slice(&item.image);
            labels.push(item.label as i64);
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch, 3, size, size]),
            device,
        );

        let mean = Tensor::<B, 4>::from_data(
            TensorData::new(IMAGENET_MEAN.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let std = Tensor::<B, 4>::from_data(
            TensorData::new(IMAGENET_STD.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let images = images.sub(mean).div(std);

        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [batch]),
            device,
        );

        FundusBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use image::{Rgb, RgbImage};
    use std::fs;

    type B = DefaultBackend;

    fn fixture_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("retina_fundus_{}_{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_jpeg(dir: &Path, id: &str, w: u32, h: u32) {
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        img.save(dir.join(format!("{id}.jpeg"))).unwrap();
    }

    fn make_item(value: f32, label: usize, size: usize) -> FundusItem {
        FundusItem {
            image: vec![value; 3 * size * size],
            label,
            path: PathBuf::from("synthetic"),
        }
    }

    #[test]
    fn test_dataset_len_and_paths() {
        let samples = vec![
            Sample { id: "10_left".to_string(), label: 0 },
            Sample { id: "10_right".to_string(), label: 3 },
        ];
        let dataset = FundusDataset::new("/data", samples, Partition::Test, 512, 42);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.image_path(1), PathBuf::from("/data/10_right.jpeg"));
        assert_eq!(dataset.labels(), vec![0, 3]);
    }

    #[test]
    fn test_test_pipeline_is_deterministic() {
        let dir = fixture_dir("det");
        write_jpeg(&dir, "a", 40, 32);
        let samples = vec![Sample { id: "a".to_string(), label: 1 }];
        let dataset = FundusDataset::new(&dir, samples, Partition::Test, 16, 42);

        let first = dataset.get(0).unwrap().unwrap();
        let second = dataset.load(0).unwrap();
        assert!(dataset.get(1).is_none());
        assert_eq!(first.image, second.image);
        assert_eq!(first.image.len(), 3 * 16 * 16);
        assert_eq!(first.label, 1);
    }

    #[test]
    fn test_train_pipeline_varies_with_epoch() {
        let dir = fixture_dir("epoch");
        write_jpeg(&dir, "b", 48, 48);
        let samples = vec![Sample { id: "b".to_string(), label: 2 }];
        let mut dataset = FundusDataset::new(&dir, samples, Partition::Train, 16, 42);

        let epoch0 = dataset.load(0).unwrap();
        let epoch0_again = dataset.load(0).unwrap();
        assert_eq!(epoch0.image, epoch0_again.image);

        dataset.set_epoch(1);
        let epoch1 = dataset.load(0).unwrap();
        assert_ne!(epoch0.image, epoch1.image);
    }

    #[test]
    fn test_missing_image_is_an_error() {
        let dir = fixture_dir("missing");
        let samples = vec![Sample { id: "nope".to_string(), label: 0 }];
        let dataset = FundusDataset::new(&dir, samples, Partition::Test, 16, 42);
        assert!(matches!(dataset.load(0), Err(RetinaError::Image(_, _))));
    }

    #[test]
    fn test_batch_shapes() {
        let device = Default::default();
        let batcher = FundusBatcher::new(8);
        let items = vec![make_item(0.5, 0, 8), make_item(0.25, 4, 8), make_item(1.0, 2, 8)];

        let batch: FundusBatch<B> = batcher.batch(items, &device);
        assert_eq!(batch.images.dims(), [3, 3, 8, 8]);
        assert_eq!(batch.targets.dims(), [3]);
    }

    #[test]
    fn test_batch_normalization() {
        let device = Default::default();
        let batcher = FundusBatcher::new(4);
        let batch: FundusBatch<B> = batcher.batch(vec![make_item(0.5, 1, 4)], &device);

        let values = batch.images.into_data().to_vec::<f32>().unwrap();
        // Red channel: (0.5 - 0.485) / 0.229
        let expected_r = (0.5 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((values[0] - expected_r).abs() < 1e-5);
        // Green channel: (0.5 - 0.456) / 0.224
        let expected_g = (0.5 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((values[16] - expected_g).abs() < 1e-5);
    }

    #[test]
    fn test_batch_targets() {
        let device = Default::default();
        let batcher = FundusBatcher::new(4);
        let batch: FundusBatch<B> =
            batcher.batch(vec![make_item(0.0, 3, 4), make_item(0.0, 0, 4)], &device);

        let targets = batch.targets.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![3, 0]);
    }
}
