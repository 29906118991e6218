//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：查询提交与完整交付

mod pipeline_commands;

pub mod handlers;

pub use pipeline_commands::*;
