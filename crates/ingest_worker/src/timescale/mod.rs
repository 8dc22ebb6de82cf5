mod sampler;
mod store;

pub use sampler::*;
pub use store::*;
