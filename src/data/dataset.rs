use std::path::Path;

use log::info;

use super::{batch::Batch, mnist};
use crate::error::{HarnessErr, Result};

/// A named partition of the dataset.
pub type Split = Batch;

/// The train, validation and test splits, read-only once loaded.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub train: Split,
    pub validation: Split,
    pub test: Split,
}

impl Dataset {
    /// Creates a new `Dataset` from already built splits.
    ///
    /// # Returns
    /// The dataset, or an error if the splits don't share their number of features.
    pub fn from_splits(train: Split, validation: Split, test: Split) -> Result<Self> {
        let features = train.features();
        if validation.features() != features || test.features() != features {
            return Err(HarnessErr::InvalidConfig(format!(
                "splits have {}, {} and {} features",
                features,
                validation.features(),
                test.features()
            )));
        }

        Ok(Self {
            train,
            validation,
            test,
        })
    }

    /// Loads MNIST from its uncompressed IDX files.
    ///
    /// The first `validation_size` training examples become the validation split.
    ///
    /// # Arguments
    /// * `dir` - The directory holding the four IDX files.
    /// * `validation_size` - The number of training examples held out for validation.
    ///
    /// # Returns
    /// The dataset with pixels scaled to `[0, 1]`.
    pub fn load_mnist(dir: &Path, validation_size: usize) -> Result<Self> {
        let train = mnist::read_split(
            &dir.join(mnist::TRAIN_IMAGES),
            &dir.join(mnist::TRAIN_LABELS),
        )?;
        let test = mnist::read_split(&dir.join(mnist::TEST_IMAGES), &dir.join(mnist::TEST_LABELS))?;

        if validation_size >= train.len() {
            return Err(HarnessErr::InvalidConfig(format!(
                "can't hold out {validation_size} of {} training examples",
                train.len()
            )));
        }

        let dataset = Self::from_splits(
            train.tail(validation_size),
            train.head(validation_size),
            test,
        )?;

        info!(
            train = dataset.train.len(),
            validation = dataset.validation.len(),
            test = dataset.test.len();
            "loaded mnist from {}", dir.display()
        );

        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2};

    use super::*;

    #[test]
    fn rejects_mismatched_features() {
        let split = |d| Batch::new(Array2::zeros((1, d)), Array1::zeros(1)).unwrap();

        assert!(Dataset::from_splits(split(2), split(2), split(2)).is_ok());
        assert!(Dataset::from_splits(split(2), split(3), split(2)).is_err());
    }
}
