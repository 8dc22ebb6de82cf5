pub mod domain;
pub mod ingest_worker;
pub mod nats;
pub mod timescale;

pub use domain::*;
pub use ingest_worker::*;
pub use nats::*;
pub use timescale::*;
