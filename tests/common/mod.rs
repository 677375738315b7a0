#![allow(dead_code)]

use std::path::Path;

use lipschitz_fairness::{Batch, Dataset, RunConfig};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng, rngs::StdRng};

pub const FEATURES: usize = 4;
pub const CLASSES: usize = 3;

/// `len` noisy examples cycling through the classes, class `c` centered on `2 * e_c`.
pub fn blobs(len: usize, seed: u64) -> Batch {
    let mut rng = StdRng::seed_from_u64(seed);
    let y = Array1::from_shape_fn(len, |i| i % CLASSES);
    let x = Array2::from_shape_fn((len, FEATURES), |(i, j)| {
        let center = if j == y[i] { 2. } else { 0. };
        center + rng.random_range(-0.3..0.3)
    });

    Batch::new(x, y).unwrap()
}

pub fn dataset() -> Dataset {
    Dataset::from_splits(blobs(60, 1), blobs(15, 2), blobs(9, 3)).unwrap()
}

pub fn config(model_dir: &Path) -> RunConfig {
    RunConfig {
        inputs: FEATURES,
        hidden1: 8,
        hidden2: 6,
        outputs: CLASSES,
        learning_rate: 0.1,
        batch_size: 10,
        num_epochs: 2,
        removed_classes: vec![2],
        removed_perc: 0.5,
        diagnostic_subset: 5,
        ..RunConfig::default()
    }
    .with_model_dir(model_dir)
}
