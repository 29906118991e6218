//! Preview Synthesizer Port - 预览片段生成
//!
//! 定义预览截取的抽象接口，具体实现在 infrastructure/adapters/preview

use std::time::Duration;
use thiserror::Error;

use crate::domain::track::AudioFormat;

/// 默认预览时长（秒）
pub const DEFAULT_PREVIEW_SECONDS: u64 = 30;

/// 预览错误
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// 预览片段（一次性，不缓存）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewArtifact {
    pub audio_data: Vec<u8>,
    pub format: AudioFormat,
    /// 预览时长（毫秒）
    pub duration_ms: u64,
    /// 完整制品时长（毫秒），无法确定时为 None
    pub source_duration_ms: Option<u64>,
}

/// Preview Synthesizer Port
///
/// 约定:
/// - 截取长度为 min(完整时长, max_duration)，不补齐、不升采样、不提高位深
/// - 比 max_duration 短的输入不是错误，原样返回（同格式、同字节）
/// - 相同输入得到逐字节相同的输出
///
/// CPU 密集型，调用方应放到 blocking 线程池中执行
pub trait PreviewSynthesizerPort: Send + Sync {
    fn make_preview(
        &self,
        audio: &[u8],
        format: AudioFormat,
        max_duration: Duration,
    ) -> Result<PreviewArtifact, PreviewError>;

    /// 检查是否支持指定格式
    fn supports_format(&self, format: AudioFormat) -> bool;
}
