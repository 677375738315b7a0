use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::{MlErr, Result, arch::layers::Dense};

/// Normal weight initialization schemes, biases always start at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Init {
    /// `N(0, sqrt(2 / fan_in))`, suited to ReLU layers.
    Kaiming,
    /// `N(0, sqrt(2 / (fan_in + fan_out)))`, suited to saturating or linear layers.
    Xavier,
}

impl Init {
    fn std_dev(&self, fan_in: usize, fan_out: usize) -> f32 {
        match self {
            Init::Kaiming => (2. / fan_in as f32).sqrt(),
            Init::Xavier => (2. / (fan_in + fan_out) as f32).sqrt(),
        }
    }

    /// Samples a fresh parameter slice for `layer`.
    ///
    /// # Arguments
    /// * `layer` - The layer the parameters are for.
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// `layer.size()` parameters, or an error if the layer's dimensions give a non finite
    /// standard deviation.
    pub fn sample<R: Rng>(&self, layer: &Dense, rng: &mut R) -> Result<Vec<f32>> {
        let (fan_in, fan_out) = layer.dim();
        let std_dev = self.std_dev(fan_in, fan_out);
        let distribution =
            Normal::new(0., std_dev).map_err(|e| MlErr::InvalidSpec(e.to_string()))?;

        let mut params: Vec<f32> = (0..fan_in * fan_out)
            .map(|_| distribution.sample(rng))
            .collect();
        params.resize(layer.size(), 0.);
        Ok(params)
    }
}
