//! Retention Context - 完整制品保留
//!
//! 预览发出后，完整制品通过短期句柄保留，等待用户显式请求

mod value_objects;

pub use value_objects::{RetentionHandle, RetentionPolicy};
