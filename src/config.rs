use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use machine_learning::{ClassifierSpec, PNorm, arch::activations::ActFnSpec};
use serde::{Deserialize, Serialize};

use crate::{
    distance::SelfPairs,
    error::{HarnessErr, Result},
};

/// The hyperparameters of a single training run.
///
/// A run never mutates its configuration, sweeps derive new ones through the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub inputs: usize,
    pub hidden1: usize,
    pub hidden2: usize,
    pub outputs: usize,
    pub activation: ActFnSpec,
    pub p_norm: PNorm,
    /// Whether every weight matrix is projected onto its norm ball after each update.
    pub lipschitz_constraint: bool,
    pub lamda1: f32,
    pub lamda2: f32,
    pub lamda3: f32,
    pub learning_rate: f32,
    pub batch_size: usize,
    pub num_epochs: usize,
    pub removed_classes: Vec<usize>,
    /// The fraction of each removed class dropped from every training batch.
    pub removed_perc: f64,
    pub model_dir: PathBuf,
    pub graph_file: String,
    pub seed: u64,
    /// The number of validation examples whose full distance matrices are kept.
    pub diagnostic_subset: usize,
    pub self_pairs: SelfPairs,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            inputs: 28 * 28,
            hidden1: 300,
            hidden2: 100,
            outputs: 10,
            activation: ActFnSpec::Relu,
            p_norm: PNorm::Infinity,
            lipschitz_constraint: false,
            lamda1: 0.25,
            lamda2: 0.25,
            lamda3: 0.25,
            learning_rate: 0.01,
            batch_size: 124,
            num_epochs: 30,
            removed_classes: vec![8],
            removed_perc: 0.95,
            model_dir: PathBuf::from("data_acquisition"),
            graph_file: "graphs.tsv".into(),
            seed: 42,
            diagnostic_subset: 20,
            self_pairs: SelfPairs::Exclude,
        }
    }
}

impl RunConfig {
    /// Reads a configuration from a json file, missing fields take their default value.
    ///
    /// # Arguments
    /// * `path` - The json file to read.
    ///
    /// # Returns
    /// The validated configuration.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| HarnessErr::io(path, e))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the fields the classifier itself doesn't validate.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(HarnessErr::InvalidConfig(
                "the batch size must be positive".into(),
            ));
        }

        if self.removed_perc.is_nan() {
            return Err(HarnessErr::InvalidPercentage(self.removed_perc));
        }

        if let Some(&class) = self.removed_classes.iter().find(|&&c| c >= self.outputs) {
            return Err(HarnessErr::ClassOutOfRange {
                class,
                classes: self.outputs,
            });
        }

        if self.diagnostic_subset == 0 {
            return Err(HarnessErr::InvalidConfig(
                "the diagnostic subset can't be empty".into(),
            ));
        }

        Ok(())
    }

    /// Enables or disables the weight norm projection.
    pub fn with_constraint(mut self, enabled: bool) -> Self {
        self.lipschitz_constraint = enabled;
        self
    }

    /// Sets the three norm bounds to the same value.
    pub fn with_lamdas(mut self, lamda: f32) -> Self {
        self.lamda1 = lamda;
        self.lamda2 = lamda;
        self.lamda3 = lamda;
        self
    }

    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    pub fn with_p_norm(mut self, p_norm: PNorm) -> Self {
        self.p_norm = p_norm;
        self
    }

    pub fn with_epochs(mut self, num_epochs: usize) -> Self {
        self.num_epochs = num_epochs;
        self
    }

    /// The specification of the classifier trained by this run.
    pub fn classifier_spec(&self) -> ClassifierSpec {
        ClassifierSpec {
            inputs: self.inputs,
            hidden1: self.hidden1,
            hidden2: self.hidden2,
            outputs: self.outputs,
            act_fn: self.activation,
            learning_rate: self.learning_rate,
            p_norm: self.p_norm,
            bounds: [self.lamda1, self.lamda2, self.lamda3],
            seed: self.seed,
        }
    }

    /// The file the plotter writes the curves into.
    pub fn graph_path(&self) -> PathBuf {
        self.model_dir.join(&self.graph_file)
    }
}
