use std::ops::Range;

use ndarray::{Array2, ArrayView2};

use super::{Model, layers::Dense};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone)]
pub struct Sequential {
    layers: Vec<Dense>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Dense>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// The model's layers, front to back.
    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// The range each layer occupies in the flat parameter buffer.
    pub fn param_ranges(&self) -> Vec<Range<usize>> {
        let mut start = 0;

        self.layers
            .iter()
            .map(|layer| {
                let range = start..start + layer.size();
                start = range.end;
                range
            })
            .collect()
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn forward<'a>(
        &'a mut self,
        params: &[f32],
        mut x: ArrayView2<'a, f32>,
    ) -> Result<ArrayView2<'a, f32>> {
        self.check_len("model parameters", params.len())?;
        let ranges = self.param_ranges();

        for (layer, range) in self.layers.iter_mut().zip(ranges) {
            x = layer.forward(&params[range], x)?;
        }

        Ok(x)
    }

    fn backward(&mut self, params: &[f32], grad: &mut [f32], mut d: Array2<f32>) -> Result<()> {
        self.check_len("model parameters", params.len())?;
        self.check_len("model gradient", grad.len())?;
        let ranges = self.param_ranges();

        for (layer, range) in self.layers.iter_mut().zip(ranges).rev() {
            d = layer.backward(&params[range.clone()], &mut grad[range], d)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr2;

    use super::*;
    use crate::arch::activations::ActFn;

    fn model() -> Sequential {
        Sequential::new([
            Dense::new((2, 3), Some(ActFn::relu())),
            Dense::new((3, 1), None),
        ])
    }

    #[test]
    fn ranges_cover_the_buffer() {
        let model = model();

        assert_eq!(model.size(), 9 + 4);
        assert_eq!(model.param_ranges(), vec![0..9, 9..13]);
    }

    #[test]
    fn forward_chains_layers() {
        let mut model = model();
        // identity-ish first layer, summing second layer
        let params = [
            1., 0., 0., //
            0., 1., 0., //
            0., 0., 0., //
            1., 1., 1., //
            0.,
        ];
        let x = arr2(&[[2., 3.], [-1., 4.]]);

        let y = model.forward(&params, x.view()).unwrap().to_owned();
        assert_eq!(y, arr2(&[[5.], [4.]]));
        assert_eq!(model.layers()[0].output(), arr2(&[[2., 3., 0.], [0., 4., 0.]]));
    }

    #[test]
    fn rejects_short_params() {
        let mut model = model();
        let x = arr2(&[[2., 3.]]);

        assert!(model.forward(&[0.; 5], x.view()).is_err());
    }
}
