mod client;
mod consumer;

pub use client::*;
pub use consumer::*;
