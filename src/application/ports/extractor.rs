//! Extractor Port - 媒体解析与下载
//!
//! 定义媒体提取器的抽象接口，具体实现在 infrastructure/adapters/extractor

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::track::{ArtifactKey, AudioFormat, Query, TrackMetadata};

/// 提取错误
///
/// 底层进程/网络错误一律归类到这四种，不向上暴露原始异常
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("No media found: {0}")]
    NotFound(String),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Unsupported source: {0}")]
    Unsupported(String),

    #[error("Decode failure: {0}")]
    DecodeFailure(String),
}

impl ExtractionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::NotFound(_) => "not_found",
            ExtractionError::NetworkFailure(_) => "network_failure",
            ExtractionError::Unsupported(_) => "unsupported",
            ExtractionError::DecodeFailure(_) => "decode_failure",
        }
    }

    /// 只有网络失败值得在提取器内部重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractionError::NetworkFailure(_))
    }
}

/// 解析结果（仅元数据，不含音频）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub key: ArtifactKey,
    pub metadata: TrackMetadata,
    /// 下载时交给提取器的规范化目标
    pub fetch_target: String,
}

/// 下载结果：临时目录中的一个音频文件，由调用方负责清理
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAudio {
    pub path: PathBuf,
    pub format: AudioFormat,
}

/// Extractor Port
///
/// 同一逻辑媒体无论通过链接还是搜索命中，都应返回相同的 ArtifactKey
#[async_trait]
pub trait ExtractorPort: Send + Sync {
    /// 解析查询，返回媒体标识与元数据
    async fn probe(&self, query: &Query) -> Result<ResolvedMedia, ExtractionError>;

    /// 下载并转码，向 `scratch_dir` 写入恰好一个文件
    async fn fetch(
        &self,
        media: &ResolvedMedia,
        scratch_dir: &Path,
    ) -> Result<FetchedAudio, ExtractionError>;

    /// probe + fetch
    async fn resolve(
        &self,
        query: &Query,
        scratch_dir: &Path,
    ) -> Result<(ResolvedMedia, FetchedAudio), ExtractionError> {
        let media = self.probe(query).await?;
        let audio = self.fetch(&media, scratch_dir).await?;
        Ok((media, audio))
    }

    /// 检查提取器是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}
