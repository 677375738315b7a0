mod act_fn;
mod relu;
mod sigmoid;

pub use act_fn::{ActFn, ActFnSpec};
pub use relu::Relu;
pub use sigmoid::Sigmoid;
