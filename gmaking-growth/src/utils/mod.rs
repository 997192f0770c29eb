//! Utility modules for gmaking-growth

pub mod pool_monitor;

pub use pool_monitor::{begin_monitored, MonitoredTransaction};
