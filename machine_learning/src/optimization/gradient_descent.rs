use ndarray::{ArrayView1, ArrayViewMut1};

use super::Optimizer;

/// Plain mini-batch gradient descent with a fixed step.
#[derive(Debug, Clone, Copy)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    /// Creates a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The factor the gradient is scaled by on every step.
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    /// `params <- params - learning_rate * grad`
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) {
        let mut params = ArrayViewMut1::from(params);
        params.scaled_add(-self.learning_rate, &ArrayView1::from(grad));
    }
}
