//! Content Store Port - 内容寻址的音频存储
//!
//! 以 (provider, source id) 的指纹为地址，提供去重、存在性检查、读取与删除

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::track::{ArtifactKey, AudioFormat, TrackMetadata};

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),
}

/// 已提交到存储中的完整制品
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub key: ArtifactKey,
    pub path: PathBuf,
    pub format: AudioFormat,
    pub size_bytes: u64,
    pub content_md5: String,
    pub metadata: TrackMetadata,
    pub created_at: DateTime<Utc>,
}

/// 存储统计信息
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// Content Store Port
///
/// 并发约定:
/// - 同一键的并发 `put` 只有第一个写入者会成为规范制品（CAS 语义）
/// - 制品只有在完整写入并校验之后才对 `exists`/`get`/`open` 可见
#[async_trait]
pub trait ContentStorePort: Send + Sync {
    /// 检查制品是否存在
    async fn exists(&self, key: &ArtifactKey) -> Result<bool, StoreError>;

    /// 查找制品
    async fn get(&self, key: &ArtifactKey) -> Result<Option<ArtifactRef>, StoreError>;

    /// 将临时文件移入寻址存储
    ///
    /// 若该键已有制品，丢弃新文件并返回已有制品
    async fn put(
        &self,
        key: &ArtifactKey,
        source: &Path,
        format: AudioFormat,
        metadata: TrackMetadata,
    ) -> Result<ArtifactRef, StoreError>;

    /// 打开制品字节流
    async fn open(&self, artifact: &ArtifactRef) -> Result<tokio::fs::File, StoreError>;

    /// 读取制品全部字节
    async fn read(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, StoreError>;

    /// 删除制品（幂等）
    async fn delete(&self, artifact: &ArtifactRef) -> Result<(), StoreError>;

    /// 列出所有制品
    async fn list(&self) -> Result<Vec<ArtifactRef>, StoreError>;

    /// 获取统计信息
    async fn stats(&self) -> StoreStats;
}
