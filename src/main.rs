use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use machine_learning::PNorm;

use lipschitz_fairness::{
    CurvePlotter, Dataset, FailurePolicy, NoPlot, Plotter, RunConfig, RunStatus, SweepDriver,
    sweep::{lamda_grid, sweep_dir_name},
};

/// Trains Lipschitz constrained MNIST classifiers over a grid of norm bounds.
#[derive(Parser, Debug)]
#[command(name = "lipschitz-fairness", version, about, long_about = None)]
struct Cli {
    /// Directory holding the uncompressed MNIST IDX files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory every sweep directory is created in
    #[arg(short, long, default_value = "data_acquisition")]
    out_dir: PathBuf,

    /// Json run configuration, missing fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the number of epochs of every run
    #[arg(long)]
    epochs: Option<usize>,

    /// Norms to sweep, in order
    #[arg(
        long = "norm",
        value_delimiter = ',',
        default_values_t = [PNorm::Infinity, PNorm::Finite(1), PNorm::Finite(2)]
    )]
    norms: Vec<PNorm>,

    /// Training examples held out for validation
    #[arg(long, default_value_t = 5000)]
    validation_size: usize,

    /// What to do when a run fails
    #[arg(long, value_enum, default_value_t = FailurePolicy::Abort)]
    on_failure: FailurePolicy,

    /// Skip writing the curve files
    #[arg(long)]
    no_plot: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut base = match &cli.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(epochs) = cli.epochs {
        base = base.with_epochs(epochs);
    }
    base.validate()?;

    let dataset = Dataset::load_mnist(&cli.data_dir, cli.validation_size)
        .with_context(|| format!("loading mnist from {}", cli.data_dir.display()))?;

    if cli.no_plot {
        run_sweeps(&cli, &base, &dataset, NoPlot)
    } else {
        run_sweeps(&cli, &base, &dataset, CurvePlotter)
    }
}

fn run_sweeps<P: Plotter>(
    cli: &Cli,
    base: &RunConfig,
    dataset: &Dataset,
    plotter: P,
) -> anyhow::Result<()> {
    let driver = SweepDriver::new(dataset, plotter, cli.on_failure);

    for &p_norm in &cli.norms {
        let Some(grid) = lamda_grid(p_norm) else {
            warn!("no lamda grid for the {p_norm}-norm, skipping it");
            continue;
        };

        let sweep_dir = sweep_dir_name(&cli.out_dir, p_norm, &chrono::Local::now());
        let config = base.clone().with_p_norm(p_norm);
        info!(norm = p_norm.to_string().as_str(); "sweeping into {}", sweep_dir.display());

        let runs = driver
            .run_constant_sweep(&config, grid, &sweep_dir)
            .with_context(|| format!("sweeping the {p_norm}-norm"))?;

        let failed = runs
            .iter()
            .filter(|run| matches!(run.status, RunStatus::Failed { .. }))
            .count();
        info!("{}-norm sweep done, {failed} of {} runs failed", p_norm, runs.len());
    }

    Ok(())
}
