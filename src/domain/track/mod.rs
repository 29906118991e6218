//! Track Context - 曲目限界上下文
//!
//! 职责:
//! - 查询解析（直链 / 搜索词）
//! - 媒体标识与内容寻址键
//! - 曲目元数据

mod errors;
mod value_objects;

pub use errors::TrackError;
pub use value_objects::{
    ArtifactKey, AudioFormat, Provider, Query, SourceId, TrackMetadata, MAX_QUERY_LEN,
};
