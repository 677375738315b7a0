use std::collections::BTreeMap;

use machine_learning::NUM_WEIGHTS;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{
    distance::ThresholdReport,
    error::{HarnessErr, Result},
};

pub const W_NORM_KEYS: [&str; NUM_WEIGHTS] = ["w1_norm", "w2_norm", "w3_norm"];
pub const TRAIN_LOSS: &str = "train_loss";
pub const TRAIN_ACC: &str = "train_acc";
pub const VAL_LOSS: &str = "val_loss";
pub const VAL_ACC: &str = "val_acc";

/// The accuracy, precision, recall and f1 score of a single class.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassScores {
    pub accuracy: f32,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
}

impl ClassScores {
    /// Derives precision, recall and f1 of `class` from a confusion matrix.
    ///
    /// # Arguments
    /// * `confusion` - A confusion matrix, rows are true classes and columns predicted ones.
    /// * `class` - The class to score.
    /// * `accuracy` - The accuracy over the examples of `class` only.
    pub fn from_confusion(confusion: ArrayView2<usize>, class: usize, accuracy: f32) -> Self {
        let tp = confusion[[class, class]] as f32;
        let predicted = confusion.column(class).sum() as f32;
        let actual = confusion.row(class).sum() as f32;

        let precision = ratio(tp, predicted);
        let recall = ratio(tp, actual);
        let f1 = ratio(2. * precision * recall, precision + recall);

        Self {
            accuracy,
            precision,
            recall,
            f1,
        }
    }
}

fn ratio(num: f32, den: f32) -> f32 {
    if den == 0. { 0. } else { num / den }
}

/// Everything measured at the end of an epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub weight_norms: [f32; NUM_WEIGHTS],
    pub train_loss: f32,
    pub train_acc: f32,
    pub val_loss: f32,
    pub val_acc: f32,
    /// One entry per class, indexed by class id.
    pub classes: Vec<ClassScores>,
}

/// The distances between the outputs of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDiagnostics {
    pub name: String,
    /// The distance matrix over the diagnostic subset.
    pub dists: Array2<f32>,
    pub max: f32,
    /// The similarity thresholds over the whole validation split.
    pub thresholds: Vec<ThresholdReport>,
}

impl LayerDiagnostics {
    /// The threshold reports rendered as `"X% threshold: Y%"`.
    pub fn threshold_lines(&self) -> Vec<String> {
        self.thresholds.iter().map(ToString::to_string).collect()
    }
}

/// The one-shot diagnostics computed once training is over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub confusion_matrix: Array2<usize>,
    /// The input images first, then every layer up to the softmax.
    pub layers: Vec<LayerDiagnostics>,
    /// Which examples of the diagnostic subset share their label.
    pub pred_map: Array2<bool>,
}

/// The record of a training run: a series per scalar metric, and the diagnostics once finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    num_classes: usize,
    series: BTreeMap<String, Vec<f32>>,
    diagnostics: Option<Diagnostics>,
}

impl MetricsRecord {
    /// Creates a new `MetricsRecord` with an empty series for every known key.
    pub fn new(num_classes: usize) -> Self {
        let keys = W_NORM_KEYS
            .iter()
            .chain(&[TRAIN_LOSS, VAL_LOSS, TRAIN_ACC, VAL_ACC])
            .map(|key| key.to_string())
            .chain((0..num_classes).flat_map(class_keys));

        Self {
            num_classes,
            series: keys.map(|key| (key, Vec::new())).collect(),
            diagnostics: None,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// The number of recorded epochs.
    pub fn epochs(&self) -> usize {
        self.series(TRAIN_LOSS).map_or(0, <[f32]>::len)
    }

    pub fn series(&self, key: &str) -> Option<&[f32]> {
        self.series.get(key).map(Vec::as_slice)
    }

    /// Every series, ordered by key.
    pub fn all_series(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.series
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        self.diagnostics.as_ref()
    }

    /// Appends the metrics of one epoch to their series.
    ///
    /// # Returns
    /// An error if `epoch` doesn't score exactly `num_classes` classes.
    pub fn record_epoch(&mut self, epoch: &EpochMetrics) -> Result<()> {
        if epoch.classes.len() != self.num_classes {
            return Err(HarnessErr::MetricsMismatch {
                got: epoch.classes.len(),
                expected: self.num_classes,
            });
        }

        for (key, &norm) in W_NORM_KEYS.iter().zip(&epoch.weight_norms) {
            self.push(key, norm);
        }

        self.push(TRAIN_LOSS, epoch.train_loss);
        self.push(TRAIN_ACC, epoch.train_acc);
        self.push(VAL_LOSS, epoch.val_loss);
        self.push(VAL_ACC, epoch.val_acc);

        for (class, scores) in epoch.classes.iter().enumerate() {
            let [acc, prec, rec, f1] = class_keys(class);
            self.push(&acc, scores.accuracy);
            self.push(&prec, scores.precision);
            self.push(&rec, scores.recall);
            self.push(&f1, scores.f1);
        }

        Ok(())
    }

    /// Stores the end of run diagnostics, replacing any previous ones.
    pub fn finalize(&mut self, diagnostics: Diagnostics) {
        self.diagnostics = Some(diagnostics);
    }

    /// Renders the record as pretty json.
    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a record previously rendered with `serialize`.
    pub fn deserialize(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn push(&mut self, key: &str, value: f32) {
        self.series.entry(key.to_string()).or_default().push(value);
    }
}

/// The accuracy, precision, recall and f1 keys of `class`.
pub fn class_keys(class: usize) -> [String; 4] {
    ["acc", "prec", "rec", "f1"].map(|metric| format!("class_{class}_{metric}"))
}
