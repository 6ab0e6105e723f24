//! Epoch batch planning
//!
//! Batches are index windows over the dataset rather than pre-materialized
//! tensors. Train epochs shuffle the index order with a seeded RNG before
//! slicing; test epochs keep dataset order so collected predictions line up
//! with the ground-truth sequence. Decoding a window fans out across the
//! rayon pool and preserves window order.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::fundus::{FundusDataset, FundusItem};
use crate::error::Result;

/// An epoch's worth of batches over one dataset partition
pub struct EpochBatches {
    indices: Vec<usize>,
    batch_size: usize,
}

impl EpochBatches {
    /// Plan a shuffled epoch. The seed should differ per epoch so the
    /// sample order changes between passes.
    pub fn shuffled(len: usize, batch_size: usize, seed: u64) -> Self {
        let mut indices: Vec<usize> = (0..len).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        Self { indices, batch_size }
    }

    /// Plan an ordered epoch, used for evaluation
    pub fn ordered(len: usize, batch_size: usize) -> Self {
        Self {
            indices: (0..len).collect(),
            batch_size,
        }
    }

    /// Number of batches, counting the trailing partial batch
    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    /// Indices covered by batch `batch_idx`
    pub fn window(&self, batch_idx: usize) -> &[usize] {
        let start = batch_idx * self.batch_size;
        let end = (start + self.batch_size).min(self.indices.len());
        &self.indices[start..end]
    }

    /// Decode one batch's items in parallel, preserving window order.
    /// The first decode failure aborts the batch.
    pub fn materialize(&self, dataset: &FundusDataset, batch_idx: usize) -> Result<Vec<FundusItem>> {
        self.window(batch_idx)
            .par_iter()
            .map(|&index| dataset.load(index))
            .collect()
    }
}
