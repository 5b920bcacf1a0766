//! Background processing: the batch scheduler and the stats monitor.

mod monitor;
mod scheduler;

pub use monitor::StatsMonitor;
pub use scheduler::{PipelineConfig, Scheduler};
