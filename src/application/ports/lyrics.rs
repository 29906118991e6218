//! Lyrics Port - 歌词查询
//!
//! 尽力而为，独立于下载流水线，不阻塞预览交付

use async_trait::async_trait;
use thiserror::Error;

/// 歌词服务错误
#[derive(Debug, Error)]
pub enum LyricsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Lyrics Port
#[async_trait]
pub trait LyricsPort: Send + Sync {
    /// 查询歌词，未找到返回 `Ok(None)`
    async fn lookup(&self, title: &str, artist: &str) -> Result<Option<String>, LyricsError>;
}
