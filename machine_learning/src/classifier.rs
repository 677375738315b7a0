use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::Path,
};

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    MlErr, Result,
    arch::{
        Model, Sequential,
        activations::{ActFn, ActFnSpec},
        layers::Dense,
        loss::{CrossEntropy, LossFn, softmax},
    },
    initialization::Init,
    norm::{PNorm, SpectralNorm},
    optimization::{GradientDescent, Optimizer},
};

const SPEC_FILE: &str = "classifier.json";
const PARAMS_FILE: &str = "params.bin";

/// The number of weight matrices in a `Classifier`.
pub const NUM_WEIGHTS: usize = 3;

/// Everything needed to build a `Classifier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSpec {
    pub inputs: usize,
    pub hidden1: usize,
    pub hidden2: usize,
    pub outputs: usize,
    pub act_fn: ActFnSpec,
    pub learning_rate: f32,
    /// The norm used for the weight norms and their projection.
    pub p_norm: PNorm,
    /// The upper bound of each weight matrix's norm when projecting.
    pub bounds: [f32; NUM_WEIGHTS],
    pub seed: u64,
}

impl ClassifierSpec {
    fn validate(&self) -> Result<()> {
        let sizes = [self.inputs, self.hidden1, self.hidden2, self.outputs];
        if sizes.contains(&0) {
            return Err(MlErr::InvalidSpec(format!(
                "every layer needs at least one unit, got {sizes:?}"
            )));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            return Err(MlErr::InvalidSpec(format!(
                "the learning rate must be positive, got {}",
                self.learning_rate
            )));
        }

        if let Some(bound) = self.bounds.iter().find(|b| !(b.is_finite() && **b > 0.)) {
            return Err(MlErr::InvalidSpec(format!(
                "the norm bounds must be positive, got {bound}"
            )));
        }

        Ok(())
    }

    fn init(&self) -> Init {
        match self.act_fn {
            ActFnSpec::Relu => Init::Kaiming,
            ActFnSpec::Sigmoid { .. } => Init::Xavier,
        }
    }
}

/// Loss and accuracy of a classifier over a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss: f32,
    pub accuracy: f32,
}

/// The per-layer outputs of a classifier for a batch.
#[derive(Debug, Clone)]
pub struct Activations {
    pub hidden1: Array2<f32>,
    pub hidden2: Array2<f32>,
    /// The output layer before the softmax.
    pub logits: Array2<f32>,
    pub softmax: Array2<f32>,
}

/// A three layer fully connected softmax classifier whose weight matrices can be projected onto a
/// p-norm ball after each update.
///
/// Each instance owns all of its training state, building a new one never observes another's.
pub struct Classifier {
    spec: ClassifierSpec,
    model: Sequential,
    params: Vec<f32>,
    grad: Vec<f32>,
    loss_fn: CrossEntropy,
    optimizer: GradientDescent,
    spectral: [SpectralNorm; NUM_WEIGHTS],
}

impl Classifier {
    /// Creates a new `Classifier` with freshly initialized parameters.
    ///
    /// # Arguments
    /// * `spec` - The classifier's specification.
    ///
    /// # Returns
    /// A new `Classifier` or an error if the spec is invalid.
    pub fn new(spec: ClassifierSpec) -> Result<Self> {
        spec.validate()?;

        let act_fn = ActFn::from(spec.act_fn);
        let model = Sequential::new([
            Dense::new((spec.inputs, spec.hidden1), Some(act_fn)),
            Dense::new((spec.hidden1, spec.hidden2), Some(act_fn)),
            Dense::new((spec.hidden2, spec.outputs), None),
        ]);

        let mut rng = StdRng::seed_from_u64(spec.seed);
        let init = spec.init();
        let mut params = Vec::with_capacity(model.size());
        for layer in model.layers() {
            params.extend(init.sample(layer, &mut rng)?);
        }

        debug!(size = params.len(); "initialized classifier parameters");

        Ok(Self {
            grad: vec![0.; params.len()],
            optimizer: GradientDescent::new(spec.learning_rate),
            loss_fn: CrossEntropy::new(),
            spectral: Default::default(),
            params,
            model,
            spec,
        })
    }

    /// The spec this classifier was built from.
    pub fn spec(&self) -> &ClassifierSpec {
        &self.spec
    }

    /// The flat parameter buffer.
    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Performs one gradient descent step over the batch.
    ///
    /// # Arguments
    /// * `x` - The input batch.
    /// * `labels` - The class of each row of `x`.
    ///
    /// # Returns
    /// The batch loss before the update, or an error if the batch is malformed or the loss
    /// stopped being finite.
    pub fn train_step(&mut self, x: ArrayView2<f32>, labels: ArrayView1<usize>) -> Result<f32> {
        self.check_batch(x, labels)?;
        let y = one_hot(labels, self.spec.outputs);

        let y_pred = self.model.forward(&self.params, x)?;
        let loss = self.loss_fn.loss(y_pred, y.view());
        if !loss.is_finite() {
            return Err(MlErr::Diverged { loss });
        }

        let d = self.loss_fn.loss_prime(y_pred, y.view());
        self.model.backward(&self.params, &mut self.grad, d)?;
        self.optimizer.update_params(&mut self.params, &self.grad);

        Ok(loss)
    }

    /// Computes the loss and the accuracy over the batch.
    ///
    /// # Returns
    /// The evaluation, or an error if the batch is malformed or the loss is not finite.
    pub fn evaluate(&mut self, x: ArrayView2<f32>, labels: ArrayView1<usize>) -> Result<Evaluation> {
        self.check_batch(x, labels)?;
        let y = one_hot(labels, self.spec.outputs);

        let logits = self.model.forward(&self.params, x)?;
        let loss = self.loss_fn.loss(logits, y.view());
        if !loss.is_finite() {
            return Err(MlErr::Diverged { loss });
        }

        let hits = argmax_rows(logits)
            .iter()
            .zip(labels)
            .filter(|(pred, label)| pred == label)
            .count();

        Ok(Evaluation {
            loss,
            accuracy: hits as f32 / labels.len() as f32,
        })
    }

    /// The mean cross-entropy over the batch.
    pub fn loss(&mut self, x: ArrayView2<f32>, labels: ArrayView1<usize>) -> Result<f32> {
        self.evaluate(x, labels).map(|eval| eval.loss)
    }

    /// The fraction of the batch classified correctly.
    pub fn accuracy(&mut self, x: ArrayView2<f32>, labels: ArrayView1<usize>) -> Result<f32> {
        self.evaluate(x, labels).map(|eval| eval.accuracy)
    }

    /// The predicted class of every row of `x`.
    pub fn predict(&mut self, x: ArrayView2<f32>) -> Result<Array1<usize>> {
        let logits = self.model.forward(&self.params, x)?;
        Ok(argmax_rows(logits))
    }

    /// The confusion matrix of the batch, rows are true classes and columns predicted ones.
    pub fn confusion_matrix(
        &mut self,
        x: ArrayView2<f32>,
        labels: ArrayView1<usize>,
    ) -> Result<Array2<usize>> {
        self.check_batch(x, labels)?;
        let classes = self.spec.outputs;
        let predictions = self.predict(x)?;

        let mut confusion = Array2::zeros((classes, classes));
        for (&label, &pred) in labels.iter().zip(&predictions) {
            confusion[[label, pred]] += 1;
        }

        Ok(confusion)
    }

    /// The output of every layer for the batch.
    pub fn activations(&mut self, x: ArrayView2<f32>) -> Result<Activations> {
        let logits = self.model.forward(&self.params, x)?.to_owned();
        let layers = self.model.layers();

        Ok(Activations {
            hidden1: layers[0].output().to_owned(),
            hidden2: layers[1].output().to_owned(),
            softmax: softmax(logits.view()),
            logits,
        })
    }

    /// The norm of each weight matrix under the spec's p-norm.
    pub fn weight_norms(&self) -> Result<[f32; NUM_WEIGHTS]> {
        let mut norms = [0.; NUM_WEIGHTS];

        let ranges = self.model.param_ranges();
        let layers = self.model.layers().iter().zip(ranges).zip(&self.spectral);
        for (norm, ((layer, range), spectral)) in norms.iter_mut().zip(layers) {
            let w = layer.weights(&self.params[range])?;
            *norm = matrix_norm(self.spec.p_norm, w, &mut spectral.clone());
        }

        Ok(norms)
    }

    /// Projects every weight matrix back onto its norm ball, `W <- W * min(1, bound / |W|)`.
    /// Biases are left untouched.
    pub fn project(&mut self) -> Result<()> {
        let ranges = self.model.param_ranges();
        let layers = self.model.layers();

        let bounds = self.spec.bounds.iter().zip(&mut self.spectral);
        for ((layer, range), (&bound, spectral)) in layers.iter().zip(ranges).zip(bounds) {
            let mut w = layer.weights_mut(&mut self.params[range])?;
            let norm = matrix_norm(self.spec.p_norm, w.view(), spectral);

            if norm > bound {
                w *= bound / norm;
            }
        }

        Ok(())
    }

    /// Persists the spec and the parameters into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let file = File::create(dir.join(SPEC_FILE))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.spec)?;
        fs::write(dir.join(PARAMS_FILE), bytemuck::cast_slice::<f32, u8>(&self.params))?;

        info!("saved classifier to {}", dir.display());
        Ok(())
    }

    /// Restores a classifier previously persisted with `save`.
    pub fn load(dir: &Path) -> Result<Self> {
        let file = File::open(dir.join(SPEC_FILE))?;
        let spec: ClassifierSpec = serde_json::from_reader(BufReader::new(file))?;
        let mut classifier = Self::new(spec)?;

        let bytes = fs::read(dir.join(PARAMS_FILE))?;
        let expected = classifier.params.len() * size_of::<f32>();
        if bytes.len() != expected {
            return Err(MlErr::SizeMismatch {
                what: "persisted parameter bytes",
                got: bytes.len(),
                expected,
            });
        }

        bytemuck::cast_slice_mut::<f32, u8>(&mut classifier.params).copy_from_slice(&bytes);
        Ok(classifier)
    }

    fn check_batch(&self, x: ArrayView2<f32>, labels: ArrayView1<usize>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(MlErr::SizeMismatch {
                what: "batch rows",
                got: 0,
                expected: 1,
            });
        }

        if x.nrows() != labels.len() {
            return Err(MlErr::SizeMismatch {
                what: "batch labels",
                got: labels.len(),
                expected: x.nrows(),
            });
        }

        let classes = self.spec.outputs;
        if let Some(&label) = labels.iter().find(|&&label| label >= classes) {
            return Err(MlErr::LabelOutOfRange { label, classes });
        }

        Ok(())
    }
}

/// The spectral norm starts from the vector of the previous estimate of the same matrix.
fn matrix_norm(p_norm: PNorm, w: ArrayView2<f32>, spectral: &mut SpectralNorm) -> f32 {
    match p_norm {
        PNorm::Finite(2) => spectral.estimate(w),
        _ => p_norm.operator_norm(w),
    }
}

fn one_hot(labels: ArrayView1<usize>, classes: usize) -> Array2<f32> {
    let mut y = Array2::zeros((labels.len(), classes));
    for (mut row, &label) in y.axis_iter_mut(Axis(0)).zip(labels) {
        row[label] = 1.;
    }
    y
}

fn argmax_rows(scores: ArrayView2<f32>) -> Array1<usize> {
    scores
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best, max), (i, &x)| {
                    if x > max { (i, x) } else { (best, max) }
                })
                .0
        })
        .collect()
}
