mod router;
mod topic;

pub use router::*;
pub use topic::*;
