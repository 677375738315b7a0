mod batch;
mod dataloader;
mod dataset;
mod mnist;

pub use batch::Batch;
pub use dataloader::BatchSampler;
pub use dataset::{Dataset, Split};
