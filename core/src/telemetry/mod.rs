pub mod log;
pub mod metrics;

pub use self::log::{SessionLog, LOG_HEADER};
pub use metrics::{MetricsSnapshot, RelayMetrics};
