use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};

use crate::error::{HarnessErr, Result};

/// Inputs and their labels, row `i` of `x` always belongs to label `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    x: Array2<f32>,
    y: Array1<usize>,
}

impl Batch {
    /// Creates a new `Batch`.
    ///
    /// # Arguments
    /// * `x` - An `(N, D)` input matrix.
    /// * `y` - The `N` labels.
    ///
    /// # Returns
    /// The batch, or an error if the lengths don't match.
    pub fn new(x: Array2<f32>, y: Array1<usize>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(HarnessErr::BatchMismatch {
                rows: x.nrows(),
                labels: y.len(),
            });
        }

        Ok(Self { x, y })
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView1<'_, usize> {
        self.y.view()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// The number of features of each row.
    #[inline]
    pub fn features(&self) -> usize {
        self.x.ncols()
    }

    /// The rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Batch {
        if indices.is_empty() {
            return Self {
                x: Array2::zeros((0, self.features())),
                y: Array1::zeros(0),
            };
        }

        Self {
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
        }
    }

    /// The first `n` rows, or all of them if there are fewer.
    pub fn head(&self, n: usize) -> Batch {
        let n = n.min(self.len());
        Self {
            x: self.x.slice(s![..n, ..]).to_owned(),
            y: self.y.slice(s![..n]).to_owned(),
        }
    }

    /// The rows from `n` onwards.
    pub fn tail(&self, n: usize) -> Batch {
        let n = n.min(self.len());
        Self {
            x: self.x.slice(s![n.., ..]).to_owned(),
            y: self.y.slice(s![n..]).to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};

    use super::*;

    fn batch() -> Batch {
        Batch::new(arr2(&[[0.0], [1.0], [2.0]]), arr1(&[5, 6, 7])).unwrap()
    }

    #[test]
    fn rejects_mismatched_labels() {
        assert!(matches!(
            Batch::new(Array2::zeros((2, 3)), arr1(&[1])),
            Err(HarnessErr::BatchMismatch { rows: 2, labels: 1 })
        ));
    }

    #[test]
    fn select_keeps_rows_with_labels() {
        let picked = batch().select(&[2, 0]);

        assert_eq!(picked.x(), arr2(&[[2.0], [0.0]]));
        assert_eq!(picked.y(), arr1(&[7, 5]));
        assert!(batch().select(&[]).is_empty());
        assert_eq!(batch().select(&[]).features(), 1);
    }

    #[test]
    fn head_and_tail_split() {
        let b = batch();

        assert_eq!(b.head(1).y(), arr1(&[5]));
        assert_eq!(b.tail(1).y(), arr1(&[6, 7]));
        assert_eq!(b.head(10).len(), 3);
        assert!(b.tail(10).is_empty());
    }
}
