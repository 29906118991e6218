//! Domain Layer - 领域层
//!
//! 包含三个限界上下文:
//! - Track Context: 查询解析、媒体标识、元数据
//! - Retention Context: 保留句柄与保留策略
//! - Pipeline Context: 请求状态机

pub mod pipeline;
pub mod retention;
pub mod track;
