use std::{
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::Path,
};

use log::info;
use machine_learning::Classifier;
use ndarray::{Array2, ArrayView2};

use crate::{
    config::RunConfig,
    data::Batch,
    distance::{distance_computation, max_distance, prediction_mapping, similarity_thresholds},
    error::{HarnessErr, Result},
    metrics::{Diagnostics, LayerDiagnostics},
};

/// The file the threshold reports of a run are appended to.
pub const THRESHOLD_FILE: &str = "threshold_metrics.txt";

const LAYER_NAMES: [&str; 5] = ["Input Images", "Layer1", "Layer2", "Layer3", "Softmax"];

/// Measures the distances between the outputs of every layer.
///
/// Full distance matrices are only kept for the first `diagnostic_subset` validation examples,
/// the whole split only contributes its threshold reports.
pub(super) fn compute(
    classifier: &mut Classifier,
    validation: &Batch,
    confusion_matrix: Array2<usize>,
    config: &RunConfig,
) -> Result<Diagnostics> {
    let subset = validation.head(config.diagnostic_subset);
    let sub = classifier.activations(subset.x())?;
    let full = classifier.activations(validation.x())?;

    let outputs: [(ArrayView2<f32>, ArrayView2<f32>); 5] = [
        (subset.x(), validation.x()),
        (sub.hidden1.view(), full.hidden1.view()),
        (sub.hidden2.view(), full.hidden2.view()),
        (sub.logits.view(), full.logits.view()),
        (sub.softmax.view(), full.softmax.view()),
    ];

    let mut layers = Vec::with_capacity(LAYER_NAMES.len());
    for (name, (small, all)) in LAYER_NAMES.into_iter().zip(outputs) {
        let dists = distance_computation(small, config.p_norm);
        let full_dists = distance_computation(all, config.p_norm);
        let thresholds = similarity_thresholds(full_dists.view(), config.self_pairs)?;

        info!(layer = name, max = max_distance(full_dists.view()); "computed pairwise distances");

        layers.push(LayerDiagnostics {
            name: name.to_string(),
            max: max_distance(dists.view()),
            dists,
            thresholds,
        });
    }

    Ok(Diagnostics {
        confusion_matrix,
        layers,
        pred_map: prediction_mapping(subset.y()),
    })
}

/// Appends one line per layer, `name['X% threshold: Y%', ...]`, to the run's threshold file.
///
/// # Arguments
/// * `dir` - The run's output directory.
/// * `diagnostics` - The finalized diagnostics of the run.
pub fn write_thresholds(dir: &Path, diagnostics: &Diagnostics) -> Result<()> {
    let path = dir.join(THRESHOLD_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| HarnessErr::io(&path, e))?;

    let mut w = BufWriter::new(file);
    let mut write_lines = || -> std::io::Result<()> {
        for layer in &diagnostics.layers {
            let quoted: Vec<_> = layer
                .threshold_lines()
                .iter()
                .map(|line| format!("'{line}'"))
                .collect();
            writeln!(w, "{}[{}]", layer.name, quoted.join(", "))?;
        }
        w.flush()
    };

    write_lines().map_err(|e| HarnessErr::io(&path, e))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use ndarray::arr2;

    use super::*;
    use crate::distance::ThresholdReport;

    fn diagnostics() -> Diagnostics {
        let report = |fraction| ThresholdReport {
            fraction,
            within: 1.,
            population: 4.,
        };

        Diagnostics {
            confusion_matrix: arr2(&[[1]]),
            layers: LAYER_NAMES
                .iter()
                .map(|name| LayerDiagnostics {
                    name: name.to_string(),
                    dists: arr2(&[[0.]]),
                    max: 0.,
                    thresholds: vec![report(0.5), report(0.75)],
                })
                .collect(),
            pred_map: arr2(&[[true]]),
        }
    }

    #[test]
    fn threshold_lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();

        write_thresholds(dir.path(), &diagnostics()).unwrap();
        write_thresholds(dir.path(), &diagnostics()).unwrap();

        let text = fs::read_to_string(dir.path().join(THRESHOLD_FILE)).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(
            lines[0],
            "Input Images['50.0% threshold: 25.0%', '75.0% threshold: 25.0%']"
        );
        assert!(lines[4].starts_with("Softmax["));
        assert_eq!(lines[5], lines[0]);
    }
}
