mod alert;
mod envelope;
mod error;
mod health;
mod metric_id;
mod records;
mod severity;
mod sink;
mod telemetry;

pub use alert::*;
pub use error::*;
pub use health::*;
pub use metric_id::*;
pub use records::*;
pub use severity::*;
pub use sink::*;
pub use telemetry::*;
