pub mod arch;
pub mod classifier;
pub mod error;
pub mod initialization;
pub mod norm;
pub mod optimization;

pub use classifier::{Activations, Classifier, ClassifierSpec, Evaluation, NUM_WEIGHTS};
pub use error::{MlErr, Result};
pub use norm::PNorm;
