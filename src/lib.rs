pub mod config;
pub mod data;
pub mod distance;
pub mod error;
pub mod metrics;
pub mod plot;
pub mod sampler;
pub mod sweep;
pub mod training;

pub use config::RunConfig;
pub use data::{Batch, BatchSampler, Dataset};
pub use distance::SelfPairs;
pub use error::{HarnessErr, Result};
pub use metrics::MetricsRecord;
pub use plot::{CurvePlotter, NoPlot, Plotter};
pub use sweep::{FailurePolicy, RunDescriptor, RunStatus, SweepDriver};
pub use training::{Phase, TrainingLoop};
