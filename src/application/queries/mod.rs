//! 应用层 - 查询（读操作）
//!
//! CQRS 查询侧：歌词、请求者统计、运行统计

mod lyrics_queries;
mod requester_queries;

pub mod handlers;

pub use lyrics_queries::*;
pub use requester_queries::*;
