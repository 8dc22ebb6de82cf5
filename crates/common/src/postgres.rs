mod bootstrap;
mod client;

pub use bootstrap::*;
pub use client::*;
