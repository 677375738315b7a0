mod common;

use std::fs;

use lipschitz_fairness::{
    FailurePolicy, MetricsRecord, NoPlot, RunConfig, RunStatus, SweepDriver,
    sweep::{BASELINE_RUN, CONFIG_FILE, METRICS_FILE, RunDescriptor, SUMMARY_FILE},
};

fn dir_names(path: &std::path::Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(path)
        .unwrap()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().unwrap().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn empty_grid_runs_only_the_baseline() {
    let out = tempfile::tempdir().unwrap();
    let dataset = common::dataset();
    let base = common::config(out.path());

    let driver = SweepDriver::new(&dataset, NoPlot, FailurePolicy::Abort);
    let runs = driver
        .run_constant_sweep(&base, &[], &out.path().join("sweep"))
        .unwrap();

    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].value, None);

    let sweep = out.path().join("sweep");
    assert_eq!(dir_names(&sweep), [BASELINE_RUN]);

    let baseline = sweep.join(BASELINE_RUN);
    let metrics = fs::read_to_string(baseline.join(METRICS_FILE)).unwrap();
    let config = fs::read_to_string(baseline.join(CONFIG_FILE)).unwrap();

    let record = MetricsRecord::deserialize(&metrics).unwrap();
    assert_eq!(record.epochs(), 2);
    let config: RunConfig = serde_json::from_str(&config).unwrap();
    assert!(!config.lipschitz_constraint);
    assert_eq!(config.model_dir, baseline);
}

#[test]
fn every_value_gets_a_constrained_run() {
    let out = tempfile::tempdir().unwrap();
    let dataset = common::dataset();
    let base = common::config(out.path()).with_constraint(true);

    let driver = SweepDriver::new(&dataset, NoPlot, FailurePolicy::Abort);
    let runs = driver
        .run_constant_sweep(&base, &[0.5, 2.], out.path())
        .unwrap();

    let mut names: Vec<_> = runs.iter().map(|run| run.name.as_str()).collect();
    assert_eq!(names, [BASELINE_RUN, "const_lamdas_val_0.5", "const_lamdas_val_2"]);
    names.sort();
    assert_eq!(dir_names(out.path()), names);

    for run in &runs[1..] {
        let text = fs::read_to_string(run.dir.join(CONFIG_FILE)).unwrap();
        let config: RunConfig = serde_json::from_str(&text).unwrap();
        let value = run.value.unwrap();

        assert!(config.lipschitz_constraint);
        assert_eq!([config.lamda1, config.lamda2, config.lamda3], [value; 3]);
    }

    // the base configuration is only ever copied
    assert_eq!(base.lamda1, 0.25);
    assert_eq!(base.model_dir, out.path());
}

#[test]
fn continue_policy_records_failures() {
    let out = tempfile::tempdir().unwrap();
    let dataset = common::dataset();
    let base = common::config(out.path());

    // a zero norm bound is rejected by the classifier
    let driver = SweepDriver::new(&dataset, NoPlot, FailurePolicy::Continue);
    let runs = driver
        .run_constant_sweep(&base, &[0., 1.], out.path())
        .unwrap();

    assert_eq!(runs.len(), 3);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert!(matches!(runs[1].status, RunStatus::Failed { .. }));
    assert_eq!(runs[2].status, RunStatus::Completed);

    assert!(!runs[1].dir.join(METRICS_FILE).exists());
    assert!(runs[2].dir.join(METRICS_FILE).exists());

    let summary = fs::read_to_string(out.path().join(SUMMARY_FILE)).unwrap();
    let summary: Vec<RunDescriptor> = serde_json::from_str(&summary).unwrap();
    assert_eq!(summary, runs);
}

#[test]
fn abort_policy_keeps_completed_runs() {
    let out = tempfile::tempdir().unwrap();
    let dataset = common::dataset();
    let base = common::config(out.path());

    let driver = SweepDriver::new(&dataset, NoPlot, FailurePolicy::Abort);
    assert!(driver.run_constant_sweep(&base, &[0., 1.], out.path()).is_err());

    assert!(out.path().join(BASELINE_RUN).join(METRICS_FILE).exists());
    assert!(!out.path().join("const_lamdas_val_1").exists());

    let summary = fs::read_to_string(out.path().join(SUMMARY_FILE)).unwrap();
    let summary: Vec<RunDescriptor> = serde_json::from_str(&summary).unwrap();
    assert_eq!(summary.len(), 2);
    assert!(matches!(summary[1].status, RunStatus::Failed { .. }));
}
