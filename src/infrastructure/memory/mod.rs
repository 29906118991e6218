//! In-Memory Implementations
//!
//! 内存中的生命周期管理实现

mod lifecycle_manager;

pub use lifecycle_manager::{InMemoryLifecycleManager, LifecycleConfig};
