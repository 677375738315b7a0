mod cross_entropy;
mod loss_fn;

pub use cross_entropy::{softmax, CrossEntropy};
pub use loss_fn::LossFn;
