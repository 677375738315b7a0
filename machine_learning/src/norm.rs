use std::{fmt, str::FromStr};

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

const POWER_ITERS: usize = 3000;
const POWER_TOL: f64 = 1e-8;

/// A p-norm: either a positive integer order or the infinity (max-abs) norm.
///
/// Serialized as the integer order or as the string `"inf"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NormRepr", into = "NormRepr")]
pub enum PNorm {
    Finite(u32),
    Infinity,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum NormRepr {
    Order(u32),
    Named(String),
}

impl PNorm {
    /// Creates a finite `PNorm` of order `p`.
    ///
    /// # Returns
    /// An error if `p` is zero.
    pub fn new(p: u32) -> Result<Self> {
        if p == 0 {
            return Err(MlErr::InvalidNorm("the order must be positive".into()));
        }

        Ok(Self::Finite(p))
    }

    /// The distance between `a` and `b` under this norm.
    ///
    /// Commutative bit for bit, and zero when both vectors are the same.
    pub fn distance(&self, a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
        self.reduce(a.iter().zip(b).map(|(x, y)| (x - y).abs()))
    }

    /// The operator norm induced by this p-norm on a weight matrix.
    ///
    /// Weights are laid out as `(in, out)` and act on row vectors (`y = x W`), so the 1-norm is the
    /// maximum absolute row sum and the infinity norm the maximum absolute column sum. The 2-norm
    /// (spectral norm) is estimated by power iteration; any other order uses the Riesz-Thorin
    /// bound `|W|_1^(1/p) * |W|_inf^(1 - 1/p)`.
    ///
    /// # Arguments
    /// * `w` - A weight matrix.
    ///
    /// # Returns
    /// The norm of the matrix, an upper bound for orders other than 1, 2 and infinity.
    pub fn operator_norm(&self, w: ArrayView2<f32>) -> f32 {
        match *self {
            PNorm::Finite(1) => max_abs_sum(w, Axis(1)),
            PNorm::Infinity => max_abs_sum(w, Axis(0)),
            PNorm::Finite(2) => SpectralNorm::default().estimate(w),
            PNorm::Finite(p) => {
                let inv = 1.0 / p as f32;
                let n1 = max_abs_sum(w, Axis(1));
                let ninf = max_abs_sum(w, Axis(0));
                n1.powf(inv) * ninf.powf(1.0 - inv)
            }
        }
    }

    fn reduce<I>(&self, abs: I) -> f32
    where
        I: Iterator<Item = f32>,
    {
        match *self {
            PNorm::Infinity => abs.fold(0.0, f32::max),
            PNorm::Finite(1) => abs.sum(),
            PNorm::Finite(2) => abs.map(|x| x * x).sum::<f32>().sqrt(),
            PNorm::Finite(p) => {
                let p = p as f32;
                abs.map(|x| x.powf(p)).sum::<f32>().powf(p.recip())
            }
        }
    }
}

/// Maximum over lanes of the sum of absolute values along `axis`.
fn max_abs_sum(w: ArrayView2<f32>, axis: Axis) -> f32 {
    w.mapv(f32::abs).sum_axis(axis).fold(0.0, |acc, &x| acc.max(x))
}

/// Power iteration over `W^T W` for the largest singular value of a matrix.
///
/// Keeps the right singular vector of the last estimate, so a matrix that changes little between
/// calls converges in a few steps.
#[derive(Debug, Clone, Default)]
pub struct SpectralNorm {
    v: Option<Array1<f64>>,
}

impl SpectralNorm {
    /// Estimates `|w|_2`, iterating until the estimate moves less than a relative `1e-8`.
    pub fn estimate(&mut self, w: ArrayView2<f32>) -> f32 {
        let (rows, cols) = w.dim();
        if rows == 0 || cols == 0 {
            return 0.0;
        }

        let w = w.mapv(f64::from);
        let mut v = match self.v.take() {
            Some(v) if v.len() == cols => v,
            _ => Array1::from_elem(cols, (cols as f64).sqrt().recip()),
        };

        let mut sigma = 0.0;
        for _ in 0..POWER_ITERS {
            let next = w.t().dot(&w.dot(&v));
            let norm = next.dot(&next).sqrt();
            if norm == 0.0 {
                return 0.0;
            }

            v = next / norm;
            // |W^T W v| tends to sigma^2
            let next_sigma = norm.sqrt();
            let converged = (next_sigma - sigma).abs() <= POWER_TOL * next_sigma;
            sigma = next_sigma;
            if converged {
                break;
            }
        }

        self.v = Some(v);
        sigma as f32
    }
}

impl fmt::Display for PNorm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PNorm::Finite(p) => write!(f, "{p}"),
            PNorm::Infinity => write!(f, "inf"),
        }
    }
}

impl FromStr for PNorm {
    type Err = MlErr;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inf" | "infinity" => Ok(PNorm::Infinity),
            other => {
                let p = other
                    .parse::<u32>()
                    .map_err(|_| MlErr::InvalidNorm(s.to_string()))?;
                PNorm::new(p)
            }
        }
    }
}

impl TryFrom<NormRepr> for PNorm {
    type Error = MlErr;

    fn try_from(value: NormRepr) -> Result<Self> {
        match value {
            NormRepr::Order(p) => PNorm::new(p),
            NormRepr::Named(name) => name.parse(),
        }
    }
}

impl From<PNorm> for NormRepr {
    fn from(value: PNorm) -> Self {
        match value {
            PNorm::Finite(p) => NormRepr::Order(p),
            PNorm::Infinity => NormRepr::Named("inf".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, arr1, arr2};

    use super::*;

    #[test]
    fn distances() {
        let a = arr1(&[0.0, 3.0]);
        let b = arr1(&[4.0, 0.0]);

        assert_eq!(PNorm::Finite(1).distance(a.view(), b.view()), 7.0);
        assert_eq!(PNorm::Finite(2).distance(a.view(), b.view()), 5.0);
        assert_eq!(PNorm::Infinity.distance(a.view(), b.view()), 4.0);
        assert_eq!(PNorm::Finite(3).distance(a.view(), a.view()), 0.0);
    }

    #[test]
    fn operator_norms() {
        // rows are inputs, columns outputs
        let w = arr2(&[[1.0, -2.0], [3.0, 4.0]]);

        assert_eq!(PNorm::Finite(1).operator_norm(w.view()), 7.0);
        assert_eq!(PNorm::Infinity.operator_norm(w.view()), 6.0);
    }

    #[test]
    fn spectral_norm_of_diagonal() {
        let w = arr2(&[[3.0, 0.0], [0.0, -5.0]]);
        let norm = PNorm::Finite(2).operator_norm(w.view());

        assert!((norm - 5.0).abs() < 1e-3, "got {norm}");
    }

    fn unit(n: usize, freq: f64) -> Array1<f64> {
        let u = Array1::from_shape_fn(n, |i| ((i as f64 + 1.) * freq).sin());
        let norm = u.dot(&u).sqrt();
        u / norm
    }

    /// `H_u D H_v` for Householder reflections `H` and a diagonal `D` whose values crowd towards
    /// `top`, like the spectrum of a random matrix near its edge.
    fn crowded_spectrum(rows: usize, cols: usize, top: f64) -> Array2<f32> {
        let mut w = Array2::<f64>::zeros((rows, cols));
        for i in 0..rows.min(cols) {
            w[[i, i]] = top * (1. - 0.75 * (i as f64 / cols as f64).powf(2. / 3.));
        }

        let u = unit(rows, 0.7);
        let uw = u.dot(&w);
        w.scaled_add(-2., &u.view().insert_axis(Axis(1)).dot(&uw.view().insert_axis(Axis(0))));

        let v = unit(cols, 1.3);
        let wv = w.dot(&v);
        w.scaled_add(-2., &wv.view().insert_axis(Axis(1)).dot(&v.view().insert_axis(Axis(0))));

        w.mapv(|x| x as f32)
    }

    #[test]
    fn spectral_norm_of_a_large_matrix() {
        let top = 2.25;
        let mut w = crowded_spectrum(784, 300, top);

        let norm = PNorm::Finite(2).operator_norm(w.view());
        assert!((norm as f64 / top - 1.).abs() < 1e-5, "got {norm}");

        // scaled onto the unit ball, the exact norm is top / norm
        w *= norm.recip();
        assert!(top / norm as f64 <= 1. + 1e-5);

        let mut estimate = SpectralNorm::default();
        let first = estimate.estimate(w.view());
        let again = estimate.estimate(w.view());
        assert!((first - 1.).abs() < 1e-5, "got {first}");
        assert!((again - first).abs() < 1e-6, "{again} != {first}");
    }

    #[test]
    fn spectral_norm_of_zero_matrix() {
        let w = Array2::<f32>::zeros((3, 2));
        assert_eq!(PNorm::Finite(2).operator_norm(w.view()), 0.0);
    }

    #[test]
    fn higher_orders_are_bounded_by_one_and_inf() {
        let w = arr2(&[[1.0, -2.0], [3.0, 4.0]]);
        let n3 = PNorm::Finite(3).operator_norm(w.view());

        assert!(n3 >= 6.0 && n3 <= 7.0, "got {n3}");
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("inf".parse::<PNorm>().unwrap(), PNorm::Infinity);
        assert_eq!("2".parse::<PNorm>().unwrap(), PNorm::Finite(2));
        assert!("0".parse::<PNorm>().is_err());
        assert!("l2".parse::<PNorm>().is_err());
        assert_eq!(PNorm::Infinity.to_string(), "inf");
        assert_eq!(PNorm::Finite(1).to_string(), "1");
    }

    #[test]
    fn serde_repr() {
        assert_eq!(serde_json::to_string(&PNorm::Infinity).unwrap(), "\"inf\"");
        assert_eq!(serde_json::to_string(&PNorm::Finite(2)).unwrap(), "2");
        assert_eq!(
            serde_json::from_str::<PNorm>("1").unwrap(),
            PNorm::Finite(1)
        );
        assert!(serde_json::from_str::<PNorm>("0").is_err());
    }
}
