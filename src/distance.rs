use std::fmt;

use machine_learning::PNorm;
use ndarray::{Array2, ArrayView1, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{HarnessErr, Result};

/// The fractions of the maximum distance at which pairwise similarity is reported.
pub const THRESHOLDS: [f64; 5] = [0.1, 0.25, 0.5, 0.75, 0.9];

/// Whether the zero self-distances on the diagonal count as pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfPairs {
    /// Only the `N(N-1)/2` distinct pairs are counted.
    #[default]
    Exclude,
    /// Every matrix entry is counted, halved and divided by `N^2 / 2`, so every self-pair is
    /// always within the threshold.
    Include,
}

/// The share of pairs whose distance is within a fraction of the maximum distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    pub fraction: f64,
    /// The number of pairs within `fraction * max`.
    pub within: f64,
    pub population: f64,
}

impl ThresholdReport {
    /// The share of pairs within the threshold, in `[0, 100]`.
    pub fn percentage(&self) -> f64 {
        100. * (self.within / self.population)
    }
}

impl fmt::Display for ThresholdReport {
    /// Floats keep a decimal point, `10.000000000000002% threshold: 25.0%`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}% threshold: {}%",
            Decimal(100. * self.fraction),
            Decimal(self.percentage())
        )
    }
}

/// Shortest round-trip rendering of a float with at least one decimal, switching to a signed two
/// digit exponent outside `[1e-4, 1e16)`.
struct Decimal(f64);

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let x = self.0;
        if x == 0. || !x.is_finite() || (1e-4..1e16).contains(&x.abs()) {
            return write!(f, "{x:?}");
        }

        let sci = format!("{x:e}");
        match sci.split_once('e') {
            Some((mantissa, exp)) => match exp.parse::<i32>() {
                Ok(exp) => {
                    let sign = if exp < 0 { '-' } else { '+' };
                    write!(f, "{mantissa}e{sign}{:02}", exp.abs())
                }
                Err(_) => write!(f, "{sci}"),
            },
            None => write!(f, "{sci}"),
        }
    }
}

/// Computes the pairwise distances between the rows of `data`.
///
/// Rows of the result are filled in parallel.
///
/// # Arguments
/// * `data` - An `(N, D)` matrix.
/// * `p_norm` - The norm the distances are measured with.
///
/// # Returns
/// The symmetric `(N, N)` distance matrix, with an exactly zero diagonal.
pub fn distance_computation(data: ArrayView2<f32>, p_norm: PNorm) -> Array2<f32> {
    let n = data.nrows();
    let mut dists = Array2::zeros((n, n));

    Zip::indexed(dists.rows_mut()).par_for_each(|i, mut row| {
        let a = data.row(i);
        for (j, d) in row.iter_mut().enumerate() {
            if i != j {
                *d = p_norm.distance(a, data.row(j));
            }
        }
    });

    dists
}

/// Maps every pair of predictions to whether they're the same.
///
/// # Returns
/// The symmetric `(N, N)` map, with a diagonal of `true`.
pub fn prediction_mapping(predictions: ArrayView1<usize>) -> Array2<bool> {
    let n = predictions.len();
    Array2::from_shape_fn((n, n), |(i, j)| predictions[i] == predictions[j])
}

/// The largest entry of a distance matrix, zero if it's empty.
pub fn max_distance(dists: ArrayView2<f32>) -> f32 {
    dists.fold(0., |acc, &d| acc.max(d))
}

/// Reports, for every fraction in `THRESHOLDS`, the share of pairs of rows of `layer_output`
/// whose distance is within that fraction of the maximum distance.
///
/// # Arguments
/// * `layer_output` - An `(N, D)` matrix.
/// * `p_norm` - The norm the distances are measured with.
/// * `self_pairs` - Whether the diagonal counts as pairs.
///
/// # Returns
/// One report per threshold, or an error if there are no pairs to count.
pub fn distance_similarity_threshold(
    layer_output: ArrayView2<f32>,
    p_norm: PNorm,
    self_pairs: SelfPairs,
) -> Result<Vec<ThresholdReport>> {
    let dists = distance_computation(layer_output, p_norm);
    similarity_thresholds(dists.view(), self_pairs)
}

/// Same as `distance_similarity_threshold` over an already computed distance matrix.
pub fn similarity_thresholds(
    dists: ArrayView2<f32>,
    self_pairs: SelfPairs,
) -> Result<Vec<ThresholdReport>> {
    let n = dists.nrows();
    let population = match self_pairs {
        SelfPairs::Exclude => (n * n.saturating_sub(1)) as f64 / 2.,
        SelfPairs::Include => (n * n) as f64 / 2.,
    };

    if population == 0. {
        return Err(HarnessErr::DegenerateDistances { points: n });
    }

    let max = max_distance(dists);
    let reports = THRESHOLDS
        .iter()
        .map(|&fraction| {
            let limit = fraction * f64::from(max);
            let within = match self_pairs {
                SelfPairs::Exclude => dists
                    .indexed_iter()
                    .filter(|&((i, j), &d)| i < j && f64::from(d) <= limit)
                    .count() as f64,
                SelfPairs::Include => {
                    dists.iter().filter(|&&d| f64::from(d) <= limit).count() as f64 / 2.
                }
            };

            ThresholdReport {
                fraction,
                within,
                population,
            }
        })
        .collect();

    Ok(reports)
}
