//! Artifact Lifecycle Port - 保留句柄与制品回收
//!
//! 定义制品生命周期管理的抽象接口，具体实现在 infrastructure/memory 层

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use super::ArtifactRef;
use crate::domain::retention::RetentionHandle;
use crate::domain::track::ArtifactKey;

/// 句柄错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    #[error("Retention handle not found: {0}")]
    NotFound(String),

    #[error("Retention handle expired: {0}")]
    Expired(String),

    /// 注册时制品已被并发删除
    #[error("Artifact no longer available: {0}")]
    ArtifactGone(String),

    #[error("Store error: {0}")]
    Store(String),
}

/// 注册成功后返回的租约
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionLease {
    pub handle: RetentionHandle,
    pub requester_id: String,
    pub key: ArtifactKey,
    pub expires_at: DateTime<Utc>,
}

/// 消费句柄得到的制品，在 `release` 之前保持固定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedArtifact {
    pub handle: RetentionHandle,
    pub requester_id: String,
    pub artifact: ArtifactRef,
}

/// 一次清扫的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// 过期的句柄数
    pub expired_handles: usize,
    /// 因引用归零删除的制品数
    pub deleted_artifacts: usize,
    /// 无引用且超过 TTL 被回收的制品数
    pub reclaimed_artifacts: usize,
}

/// 生命周期统计
#[derive(Debug, Clone, Default)]
pub struct LifecycleStats {
    pub live_handles: usize,
    pub pinned_artifacts: usize,
    pub tombstones: usize,
}

/// Artifact Lifecycle Port
///
/// 保证: 每个注册的句柄最终要么被消费，要么被清扫
#[async_trait]
pub trait ArtifactLifecyclePort: Send + Sync {
    /// 为制品签发保留句柄，制品引用计数 +1
    async fn register(
        &self,
        requester_id: &str,
        artifact: &ArtifactRef,
        ttl: Duration,
    ) -> Result<RetentionLease, HandleError>;

    /// 消费句柄（一次性）
    ///
    /// 成功后制品保持固定，直到调用 `release`
    async fn consume(&self, handle: &RetentionHandle) -> Result<ConsumedArtifact, HandleError>;

    /// 释放一次引用，返回制品是否因此被删除
    async fn release(&self, artifact: &ArtifactRef) -> Result<bool, HandleError>;

    /// 撤销未消费的句柄（错误路径清理）
    async fn revoke(&self, handle: &RetentionHandle) -> Result<(), HandleError>;

    /// 清扫过期句柄与无引用的过期制品
    async fn sweep(&self) -> SweepReport;

    /// 获取统计信息
    async fn stats(&self) -> LifecycleStats;
}
