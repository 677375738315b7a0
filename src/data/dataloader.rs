use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::batch::Batch;

/// Draws mini-batches from a split without replacement, reshuffling at every epoch boundary.
///
/// The sampler only owns the permutation and its rng, the split itself is borrowed on every
/// draw so it can be shared between runs.
#[derive(Debug, Clone)]
pub struct BatchSampler {
    order: Vec<usize>,
    cursor: usize,
    epochs: usize,
    rng: StdRng,
}

impl BatchSampler {
    /// Creates a new `BatchSampler`.
    ///
    /// # Arguments
    /// * `len` - The number of examples in the split to sample from.
    /// * `seed` - The seed of the shuffling rng.
    pub fn new(len: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut rng);

        Self {
            order,
            cursor: 0,
            epochs: 0,
            rng,
        }
    }

    /// The number of completed passes over the split.
    #[inline]
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Draws the next `size` examples of `split`.
    ///
    /// A batch straddling an epoch boundary is completed from the next permutation.
    ///
    /// # Arguments
    /// * `split` - The split this sampler was created for.
    /// * `size` - The number of examples to draw.
    ///
    /// # Returns
    /// The batch, empty if the split is.
    pub fn next_batch(&mut self, split: &Batch, size: usize) -> Batch {
        if self.order.is_empty() {
            return split.select(&[]);
        }

        let mut indices = Vec::with_capacity(size);
        while indices.len() < size {
            if self.cursor == self.order.len() {
                self.order.shuffle(&mut self.rng);
                self.cursor = 0;
                self.epochs += 1;
            }

            let take = (size - indices.len()).min(self.order.len() - self.cursor);
            indices.extend_from_slice(&self.order[self.cursor..self.cursor + take]);
            self.cursor += take;
        }

        split.select(&indices)
    }
}
