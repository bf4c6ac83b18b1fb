pub mod discovery;
pub mod metrics;
pub mod status;

pub use discovery::*;
pub use metrics::{keys, MetricSet, MetricValue};
pub use status::*;
