use std::{
    fs::File,
    io::{BufWriter, Write},
};

use log::{debug, info};

use crate::{
    config::RunConfig,
    error::{HarnessErr, Result},
    metrics::{MetricsRecord, TRAIN_ACC, TRAIN_LOSS, VAL_ACC, VAL_LOSS},
};

/// Renders the curves of a finished run.
pub trait Plotter {
    /// # Arguments
    /// * `record` - The finalized metrics of the run.
    /// * `config` - The run's configuration, its `model_dir` is where output goes.
    /// * `display` - Whether to also show the result interactively.
    fn plot(&self, record: &MetricsRecord, config: &RunConfig, display: bool) -> Result<()>;
}

/// Writes every per-epoch series as a tab separated table, one row per epoch, into
/// `model_dir/graph_file`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurvePlotter;

impl Plotter for CurvePlotter {
    fn plot(&self, record: &MetricsRecord, config: &RunConfig, display: bool) -> Result<()> {
        let path = config.graph_path();
        let file = File::create(&path).map_err(|e| HarnessErr::io(&path, e))?;
        let mut w = BufWriter::new(file);

        let series: Vec<_> = record.all_series().collect();
        let mut write_table = || -> std::io::Result<()> {
            write!(w, "epoch")?;
            for (key, _) in &series {
                write!(w, "\t{key}")?;
            }
            writeln!(w)?;

            for epoch in 0..record.epochs() {
                write!(w, "{}", epoch + 1)?;
                for (_, values) in &series {
                    match values.get(epoch) {
                        Some(v) => write!(w, "\t{v}")?,
                        None => write!(w, "\t")?,
                    }
                }
                writeln!(w)?;
            }

            w.flush()
        };
        write_table().map_err(|e| HarnessErr::io(&path, e))?;

        debug!("wrote {} curves to {}", series.len(), path.display());

        if display {
            for key in [TRAIN_LOSS, VAL_LOSS, TRAIN_ACC, VAL_ACC] {
                if let Some(last) = record.series(key).and_then(<[f32]>::last) {
                    info!("{key}: {last}");
                }
            }
        }

        Ok(())
    }
}

/// Plots nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlot;

impl Plotter for NoPlot {
    fn plot(&self, _: &MetricsRecord, _: &RunConfig, _: bool) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::metrics::{ClassScores, EpochMetrics};

    use super::*;

    #[test]
    fn writes_one_row_per_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::default().with_model_dir(dir.path());

        let mut record = MetricsRecord::new(1);
        for loss in [0.9, 0.4] {
            record
                .record_epoch(&EpochMetrics {
                    weight_norms: [1.; 3],
                    train_loss: loss,
                    train_acc: 0.5,
                    val_loss: loss,
                    val_acc: 0.5,
                    classes: vec![ClassScores::default()],
                })
                .unwrap();
        }

        CurvePlotter.plot(&record, &config, false).unwrap();

        let table = fs::read_to_string(config.graph_path()).unwrap();
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("epoch\t"));
        assert!(lines[0].contains("\ttrain_loss"));
        assert!(lines[2].starts_with("2\t"));
        assert_eq!(lines[1].split('\t').count(), 1 + 7 + 4);
    }
}
