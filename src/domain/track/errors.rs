//! Track Context - Errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
    #[error("查询不能为空")]
    EmptyQuery,

    #[error("查询过长: {len} 字符（上限 {max}）")]
    QueryTooLong { len: usize, max: usize },

    #[error("无效的媒体标识: {0:?}")]
    InvalidSourceId(String),

    #[error("未知的媒体来源: {0}")]
    UnknownProvider(String),

    #[error("不支持的音频格式: {0}")]
    UnsupportedFormat(String),
}
