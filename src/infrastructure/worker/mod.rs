//! Worker Layer - Background Task Processing
//!
//! 实现 SweepWorker，周期性回收过期句柄与闲置制品

mod sweep_worker;

pub use sweep_worker::{SweepWorker, SweepWorkerConfig};
