//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{
    ExtractionError, HandleError, LyricsError, PreviewError, RepositoryError, StoreError,
};
use crate::domain::pipeline::StateTransitionError;
use crate::domain::track::TrackError;

/// 面向用户的统一获取失败提示
pub const FETCH_FAILED_MESSAGE: &str = "could not fetch this track";

/// 句柄过期提示
pub const HANDLE_EXPIRED_MESSAGE: &str = "link expired, search again";

/// 应用层错误
///
/// `Clone`: 同一个下载失败需要分发给所有等待者
#[derive(Debug, Clone, Error)]
pub enum ApplicationError {
    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 获取失败（提取/存储/预览），`kind` 仅用于日志与粗粒度标记
    #[error("{}", FETCH_FAILED_MESSAGE)]
    FetchFailed { kind: &'static str },

    /// 句柄不存在或已被消费
    #[error("Retention handle not found: {0}")]
    HandleNotFound(String),

    /// 句柄已过期
    #[error("{}", HANDLE_EXPIRED_MESSAGE)]
    HandleExpired(String),

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 仓储错误
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// 外部服务错误
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// 存储错误（非请求路径，例如统计、清扫）
    #[error("Storage error: {0}")]
    StorageError(String),

    /// 请求方已离开
    #[error("Request cancelled")]
    Cancelled,

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建状态无效错误
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    /// 粗粒度错误标记，用于事件与日志
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "validation",
            Self::FetchFailed { kind } => *kind,
            Self::HandleNotFound(_) => "handle_not_found",
            Self::HandleExpired(_) => "handle_expired",
            Self::InvalidState(_) => "invalid_state",
            Self::RepositoryError(_) => "repository",
            Self::ExternalServiceError(_) => "external_service",
            Self::StorageError(_) => "storage",
            Self::Cancelled => "cancelled",
            Self::InternalError(_) => "internal",
        }
    }

    /// 给最终用户看的消息
    pub fn user_message(&self) -> String {
        match self {
            Self::FetchFailed { .. } => FETCH_FAILED_MESSAGE.to_string(),
            Self::HandleExpired(_) => HANDLE_EXPIRED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<TrackError> for ApplicationError {
    fn from(err: TrackError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<ExtractionError> for ApplicationError {
    fn from(err: ExtractionError) -> Self {
        tracing::warn!(kind = err.kind(), error = %err, "Extraction failed");
        Self::FetchFailed { kind: err.kind() }
    }
}

impl From<StoreError> for ApplicationError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Content store failed");
        Self::FetchFailed { kind: "store" }
    }
}

impl From<PreviewError> for ApplicationError {
    fn from(err: PreviewError) -> Self {
        tracing::warn!(error = %err, "Preview synthesis failed");
        Self::FetchFailed { kind: "preview" }
    }
}

impl From<HandleError> for ApplicationError {
    fn from(err: HandleError) -> Self {
        match err {
            HandleError::NotFound(h) => Self::HandleNotFound(h),
            HandleError::Expired(h) => Self::HandleExpired(h),
            HandleError::ArtifactGone(key) => {
                tracing::warn!(key = %key, "Artifact disappeared during registration");
                Self::FetchFailed { kind: "artifact_gone" }
            }
            HandleError::Store(e) => {
                tracing::error!(error = %e, "Lifecycle store failure");
                Self::FetchFailed { kind: "store" }
            }
        }
    }
}

impl From<StateTransitionError> for ApplicationError {
    fn from(err: StateTransitionError) -> Self {
        Self::InvalidState(err.to_string())
    }
}

impl From<LyricsError> for ApplicationError {
    fn from(err: LyricsError) -> Self {
        Self::ExternalServiceError(err.to_string())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        Self::RepositoryError(err.to_string())
    }
}
