use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, TimeZone};
use log::{error, info};
use machine_learning::PNorm;
use serde::{Deserialize, Serialize};

use crate::{
    config::RunConfig,
    data::Dataset,
    error::{HarnessErr, Result},
    plot::Plotter,
    training::TrainingLoop,
};

pub const BASELINE_RUN: &str = "original";
pub const METRICS_FILE: &str = "model_metrics.txt";
pub const CONFIG_FILE: &str = "model_config.txt";
pub const SUMMARY_FILE: &str = "sweep_summary.json";

/// What a sweep does when one of its runs fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the sweep and return the run's error.
    #[default]
    Abort,
    /// Record the failure and move on to the next value.
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed { error: String },
}

/// A single run of a sweep and how it went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDescriptor {
    pub name: String,
    /// The value every lamda was set to, `None` for the unconstrained baseline.
    pub value: Option<f32>,
    pub dir: PathBuf,
    #[serde(flatten)]
    pub status: RunStatus,
}

/// Trains one baseline and one constrained classifier per hyperparameter value, each into its
/// own directory.
pub struct SweepDriver<'a, P> {
    dataset: &'a Dataset,
    plotter: P,
    policy: FailurePolicy,
}

impl<'a, P: Plotter> SweepDriver<'a, P> {
    /// Creates a new `SweepDriver`.
    ///
    /// # Arguments
    /// * `dataset` - The dataset shared by every run.
    /// * `plotter` - Renders each run's curves.
    /// * `policy` - What to do when a run fails.
    pub fn new(dataset: &'a Dataset, plotter: P, policy: FailurePolicy) -> Self {
        Self {
            dataset,
            plotter,
            policy,
        }
    }

    /// Runs the unconstrained baseline into `sweep_dir/original`, then a constrained run with all
    /// three lamdas set to each of `values` into `sweep_dir/const_lamdas_val_{value}`.
    ///
    /// Every run writes its metrics and configuration next to its model, and the descriptors of
    /// all attempted runs are written to `sweep_dir/sweep_summary.json`. Completed runs are kept
    /// on disk whatever happens to the next ones.
    ///
    /// # Arguments
    /// * `base` - The configuration every run is derived from, never modified.
    /// * `values` - The lamda values to sweep over.
    /// * `sweep_dir` - The sweep's output directory.
    ///
    /// # Returns
    /// The descriptor of every run, or the first run error under `FailurePolicy::Abort`.
    pub fn run_constant_sweep(
        &self,
        base: &RunConfig,
        values: &[f32],
        sweep_dir: &Path,
    ) -> Result<Vec<RunDescriptor>> {
        fs::create_dir_all(sweep_dir).map_err(|e| HarnessErr::io(sweep_dir, e))?;

        let baseline = sweep_dir.join(BASELINE_RUN);
        let mut runs = vec![(
            BASELINE_RUN.to_string(),
            None,
            base.clone().with_constraint(false).with_model_dir(baseline),
        )];

        for &value in values {
            let name = format!("const_lamdas_val_{value}");
            let config = base
                .clone()
                .with_lamdas(value)
                .with_constraint(true)
                .with_model_dir(sweep_dir.join(&name));
            runs.push((name, Some(value), config));
        }

        let mut descriptors = Vec::with_capacity(runs.len());
        for (name, value, config) in runs {
            info!(run = name.as_str(); "starting run");

            let status = match self.run_one(&config) {
                Ok(()) => RunStatus::Completed,
                Err(e) => {
                    error!(run = name.as_str(); "run failed: {e}");
                    if self.policy == FailurePolicy::Abort {
                        descriptors.push(RunDescriptor {
                            name,
                            value,
                            dir: config.model_dir,
                            status: RunStatus::Failed {
                                error: e.to_string(),
                            },
                        });
                        write_summary(sweep_dir, &descriptors)?;
                        return Err(e);
                    }

                    RunStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };

            descriptors.push(RunDescriptor {
                name,
                value,
                dir: config.model_dir,
                status,
            });
        }

        write_summary(sweep_dir, &descriptors)?;
        Ok(descriptors)
    }

    fn run_one(&self, config: &RunConfig) -> Result<()> {
        let dir = &config.model_dir;
        fs::create_dir_all(dir).map_err(|e| HarnessErr::io(dir, e))?;

        let record = TrainingLoop::new(config, self.dataset, &self.plotter).run()?;

        let metrics_path = dir.join(METRICS_FILE);
        fs::write(&metrics_path, record.serialize()?)
            .map_err(|e| HarnessErr::io(&metrics_path, e))?;

        let config_path = dir.join(CONFIG_FILE);
        fs::write(&config_path, serde_json::to_string_pretty(config)?)
            .map_err(|e| HarnessErr::io(&config_path, e))?;

        Ok(())
    }
}

fn write_summary(sweep_dir: &Path, descriptors: &[RunDescriptor]) -> Result<()> {
    let path = sweep_dir.join(SUMMARY_FILE);
    fs::write(&path, serde_json::to_string_pretty(descriptors)?)
        .map_err(|e| HarnessErr::io(&path, e))
}

/// The lamda values swept for each norm, `None` for norms without a grid.
pub fn lamda_grid(p_norm: PNorm) -> Option<&'static [f32]> {
    match p_norm {
        PNorm::Infinity => Some(&[0.1, 0.15, 0.2, 0.25, 0.3, 0.35, 0.4]),
        PNorm::Finite(1) => Some(&[10., 100., 500., 1000., 2000., 3000., 5000., 7000.]),
        PNorm::Finite(2) => Some(&[1., 5., 10., 15., 20., 25., 30., 35., 40.]),
        PNorm::Finite(_) => None,
    }
}

/// The directory of a sweep over `p_norm` started at `started`, `test_p_norm_{norm}_{timestamp}`.
pub fn sweep_dir_name<Tz>(root: &Path, p_norm: PNorm, started: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    root.join(format!(
        "test_p_norm_{p_norm}_{}",
        started.format("%Y_%m_%d_%H_%M_%S")
    ))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn grids_per_norm() {
        assert_eq!(lamda_grid(PNorm::Infinity).map(<[f32]>::len), Some(7));
        assert_eq!(lamda_grid(PNorm::Finite(1)).map(<[f32]>::len), Some(8));
        assert_eq!(lamda_grid(PNorm::Finite(2)).map(<[f32]>::len), Some(9));
        assert!(lamda_grid(PNorm::Finite(3)).is_none());
    }

    #[test]
    fn timestamped_dir_name() {
        let started = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        let dir = sweep_dir_name(Path::new("out"), PNorm::Infinity, &started);

        assert_eq!(dir, Path::new("out/test_p_norm_inf_2024_03_07_09_05_01"));
    }

    #[test]
    fn descriptor_json() {
        let run = RunDescriptor {
            name: "const_lamdas_val_0.1".into(),
            value: Some(0.1),
            dir: PathBuf::from("sweep/const_lamdas_val_0.1"),
            status: RunStatus::Failed {
                error: "boom".into(),
            },
        };

        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "boom");
        assert_eq!(serde_json::from_value::<RunDescriptor>(json).unwrap(), run);
    }
}
