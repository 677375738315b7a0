use ndarray::{Array2, ArrayView1, ArrayView2};

use super::LossFn;

/// Softmax cross-entropy loss function.
///
/// Takes raw logits as predictions and one-hot rows as targets, the softmax is folded into the
/// loss so its gradient is simply `softmax(y_pred) - y`.
#[derive(Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let n = y_pred.nrows();
        if n == 0 {
            return 0.0;
        }

        let total: f32 = y_pred
            .rows()
            .into_iter()
            .zip(y.rows())
            .map(|(logits, target)| {
                let lse = log_sum_exp(logits);
                target
                    .iter()
                    .zip(logits)
                    .map(|(&t, &z)| t * (lse - z))
                    .sum::<f32>()
            })
            .sum();

        total / n as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.nrows().max(1) as f32;
        (softmax(y_pred) - &y) / n
    }
}

/// Row-wise softmax of a batch of logits.
pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
    let mut out = logits.to_owned();

    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
        row.mapv_inplace(|x| (x - max).exp());
        let sum = row.sum();
        row /= sum;
    }

    out
}

fn log_sum_exp(logits: ArrayView1<f32>) -> f32 {
    let max = logits.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
    logits.iter().map(|&x| (x - max).exp()).sum::<f32>().ln() + max
}
