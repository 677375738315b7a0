use rand::{Rng, seq::SliceRandom};

use crate::{
    data::Batch,
    error::{HarnessErr, Result},
};

/// The outcome of `remove_class`.
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    /// The surviving rows, in their original order.
    pub batch: Batch,
    pub deleted: usize,
    /// The number of rows of the class before the removal.
    pub class_count: usize,
}

/// Drops a random fraction of the rows of one class.
///
/// The rows labeled `class_id` are shuffled and the first `floor(percentage * count)` of them are
/// deleted from both the inputs and the labels.
///
/// # Arguments
/// * `batch` - The batch to filter.
/// * `class_id` - The class to thin out, may be absent from the batch.
/// * `percentage` - The fraction to delete, clamped to `[0, 1]`.
/// * `rng` - The rng used to pick the deleted rows.
///
/// # Returns
/// The filtered batch with the deletion counts, or an error if `percentage` is NaN.
pub fn remove_class<R: Rng + ?Sized>(
    batch: &Batch,
    class_id: usize,
    percentage: f64,
    rng: &mut R,
) -> Result<Removal> {
    if percentage.is_nan() {
        return Err(HarnessErr::InvalidPercentage(percentage));
    }

    let mut indices: Vec<usize> = batch
        .y()
        .iter()
        .enumerate()
        .filter(|&(_, &label)| label == class_id)
        .map(|(i, _)| i)
        .collect();

    let class_count = indices.len();
    let deleted = (percentage.clamp(0., 1.) * class_count as f64).floor() as usize;
    if deleted == 0 {
        return Ok(Removal {
            batch: batch.clone(),
            deleted,
            class_count,
        });
    }

    indices.shuffle(rng);

    let mut keep = vec![true; batch.len()];
    for &i in &indices[..deleted] {
        keep[i] = false;
    }

    let survivors: Vec<usize> = (0..batch.len()).filter(|&i| keep[i]).collect();

    Ok(Removal {
        batch: batch.select(&survivors),
        deleted,
        class_count,
    })
}

/// Keeps only the rows labeled `class_id` by removing every other class of `[0, num_classes)`.
///
/// # Returns
/// The rows of `class_id` in their original order, or an error if the class is out of range.
pub fn feed_single_class<R: Rng + ?Sized>(
    batch: &Batch,
    class_id: usize,
    num_classes: usize,
    rng: &mut R,
) -> Result<Batch> {
    if class_id >= num_classes {
        return Err(HarnessErr::ClassOutOfRange {
            class: class_id,
            classes: num_classes,
        });
    }

    let mut filtered = batch.clone();
    for other in (0..num_classes).filter(|&c| c != class_id) {
        filtered = remove_class(&filtered, other, 1.0, rng)?.batch;
    }

    Ok(filtered)
}
