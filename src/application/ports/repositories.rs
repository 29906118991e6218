//! Repository Ports - 持久化端口
//!
//! 请求者统计（搜索次数、语言偏好），流水线不依赖它也能工作

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// 仓储错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// 请求者记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterRecord {
    pub requester_id: String,
    pub search_count: u64,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Requester Repository Port
#[async_trait]
pub trait RequesterRepositoryPort: Send + Sync {
    /// 记录一次搜索，返回累计次数
    async fn record_search(&self, requester_id: &str) -> Result<u64, RepositoryError>;

    /// 设置语言偏好
    async fn set_language(&self, requester_id: &str, language: &str)
        -> Result<(), RepositoryError>;

    /// 查找请求者
    async fn find(&self, requester_id: &str) -> Result<Option<RequesterRecord>, RepositoryError>;
}
