mod common;

use std::fs;

use lipschitz_fairness::{
    CurvePlotter, HarnessErr, NoPlot, Phase, TrainingLoop,
    metrics::{TRAIN_LOSS, VAL_ACC, W_NORM_KEYS},
    training::THRESHOLD_FILE,
};
use machine_learning::Classifier;

#[test]
fn full_run_records_every_epoch_and_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = common::dataset();
    let config = common::config(dir.path());

    let mut training = TrainingLoop::new(&config, &dataset, &CurvePlotter);
    assert_eq!(training.phase(), Phase::Initializing);
    let record = training.run().unwrap();
    assert_eq!(training.phase(), Phase::Done);

    assert_eq!(record.epochs(), 2);
    for (key, values) in record.all_series() {
        assert_eq!(values.len(), 2, "series {key}");
        assert!(values.iter().all(|v| v.is_finite()), "series {key}");
    }

    let diagnostics = record.diagnostics().unwrap();
    assert_eq!(diagnostics.confusion_matrix.dim(), (3, 3));
    assert_eq!(diagnostics.confusion_matrix.sum(), 15);
    assert_eq!(diagnostics.pred_map.dim(), (5, 5));

    let names: Vec<_> = diagnostics.layers.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["Input Images", "Layer1", "Layer2", "Layer3", "Softmax"]);
    for layer in &diagnostics.layers {
        assert_eq!(layer.dists.dim(), (5, 5));
        assert_eq!(layer.thresholds.len(), 5);
    }

    let thresholds = fs::read_to_string(dir.path().join(THRESHOLD_FILE)).unwrap();
    assert_eq!(thresholds.lines().count(), 5);
    assert!(thresholds.starts_with("Input Images['10.000000000000002% threshold: "));
    assert!(config.graph_path().exists());

    let restored = Classifier::load(dir.path()).unwrap();
    assert_eq!(restored.spec(), &config.classifier_spec());
}

#[test]
fn constraint_bounds_every_recorded_norm() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = common::dataset();
    let config = common::config(dir.path())
        .with_lamdas(0.5)
        .with_constraint(true);

    let record = TrainingLoop::new(&config, &dataset, &NoPlot).run().unwrap();

    for key in W_NORM_KEYS {
        for &norm in record.series(key).unwrap() {
            assert!(norm <= 0.5 + 1e-4, "{key} is {norm}");
        }
    }
}

#[test]
fn runs_with_the_same_config_match() {
    let dataset = common::dataset();

    let a_dir = tempfile::tempdir().unwrap();
    let a = common::config(a_dir.path());
    let first = TrainingLoop::new(&a, &dataset, &NoPlot).run().unwrap();

    let b_dir = tempfile::tempdir().unwrap();
    let b = common::config(b_dir.path());
    let second = TrainingLoop::new(&b, &dataset, &NoPlot).run().unwrap();

    assert_eq!(first, second);
}

#[test]
fn training_improves_validation_accuracy() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = common::dataset();
    let mut config = common::config(dir.path()).with_epochs(40);
    config.removed_classes.clear();

    let record = TrainingLoop::new(&config, &dataset, &NoPlot).run().unwrap();

    let losses = record.series(TRAIN_LOSS).unwrap();
    let (first, last) = (losses[0], losses[losses.len() - 1]);
    assert!(last < first, "{last} >= {first}");

    let accuracies = record.series(VAL_ACC).unwrap();
    assert!(accuracies[accuracies.len() - 1] > 0.9);
}

#[test]
fn oversized_batches_fail_before_training() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = common::dataset();
    let mut config = common::config(dir.path());
    config.batch_size = 61;

    let mut training = TrainingLoop::new(&config, &dataset, &NoPlot);
    assert!(matches!(training.run(), Err(HarnessErr::InvalidConfig(_))));
    assert_eq!(training.phase(), Phase::Initializing);
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn fully_removed_class_still_trains() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = common::dataset();
    let mut config = common::config(dir.path());
    config.removed_perc = 1.0;

    let record = TrainingLoop::new(&config, &dataset, &NoPlot).run().unwrap();

    assert_eq!(record.epochs(), 2);
    assert_eq!(record.diagnostics().unwrap().confusion_matrix.row(2).sum(), 5);
}
