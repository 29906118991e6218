//! Pipeline Commands - 查询提交与完整交付

use chrono::{DateTime, Utc};
use futures_util::Stream;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::mpsc;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    ArtifactLifecyclePort, ArtifactRef, ConsumedArtifact, PreviewArtifact,
};
use crate::domain::retention::RetentionHandle;
use crate::domain::track::{ArtifactKey, TrackMetadata};

// ============================================================================
// Commands
// ============================================================================

/// 提交查询（链接或搜索词）
#[derive(Debug, Clone)]
pub struct SubmitQueryCommand {
    pub requester_id: String,
    pub query: String,
}

impl SubmitQueryCommand {
    pub fn new(requester_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            requester_id: requester_id.into(),
            query: query.into(),
        }
    }
}

/// 凭保留句柄请求完整音频
#[derive(Debug, Clone)]
pub struct RequestFullCommand {
    pub handle: String,
}

impl RequestFullCommand {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// 预览就绪
#[derive(Debug, Clone)]
pub struct PreviewReady {
    pub key: ArtifactKey,
    pub metadata: TrackMetadata,
    pub preview: PreviewArtifact,
    pub handle: RetentionHandle,
    pub expires_at: DateTime<Utc>,
}

/// 流水线事件
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Searching,
    Downloading { key: ArtifactKey },
    Cached { key: ArtifactKey, reused: bool },
    PreviewReady(PreviewReady),
    Failed { reason: String, kind: &'static str },
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::PreviewReady(_) | PipelineEvent::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Searching => "searching",
            PipelineEvent::Downloading { .. } => "downloading",
            PipelineEvent::Cached { .. } => "cached",
            PipelineEvent::PreviewReady(_) => "preview_ready",
            PipelineEvent::Failed { .. } => "failed",
        }
    }

    pub(crate) fn failed(error: &ApplicationError) -> Self {
        PipelineEvent::Failed {
            reason: error.user_message(),
            kind: error.kind(),
        }
    }
}

/// 一次查询的事件订阅
///
/// 丢弃订阅即取消该请求方的流水线；已经开始的下载仍会为其他等待者完成
pub struct PipelineSubscription {
    receiver: mpsc::Receiver<PipelineEvent>,
}

impl PipelineSubscription {
    pub(crate) fn new(receiver: mpsc::Receiver<PipelineEvent>) -> Self {
        Self { receiver }
    }

    /// 接收下一个事件，流水线结束后返回 None
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        self.receiver.recv().await
    }

    /// 以 `Stream` 形式消费事件，终止事件之后流结束
    pub fn into_stream(self) -> impl Stream<Item = PipelineEvent> + Send {
        futures_util::stream::unfold(self.receiver, |mut receiver| async move {
            receiver.recv().await.map(|event| (event, receiver))
        })
    }

    /// 收集事件直到终止事件
    pub async fn collect(mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.receiver.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }
}

// ============================================================================
// Full delivery
// ============================================================================

/// 完整音频交付
///
/// 读取完毕后调用 `finish` 释放制品引用；直接丢弃也会在后台释放
pub struct FullDelivery {
    handle: RetentionHandle,
    requester_id: String,
    artifact: ArtifactRef,
    file: tokio::fs::File,
    lifecycle: Option<Arc<dyn ArtifactLifecyclePort>>,
}

impl FullDelivery {
    pub(crate) fn new(
        consumed: ConsumedArtifact,
        file: tokio::fs::File,
        lifecycle: Arc<dyn ArtifactLifecyclePort>,
    ) -> Self {
        Self {
            handle: consumed.handle,
            requester_id: consumed.requester_id,
            artifact: consumed.artifact,
            file,
            lifecycle: Some(lifecycle),
        }
    }

    pub fn handle(&self) -> &RetentionHandle {
        &self.handle
    }

    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }

    pub fn artifact(&self) -> &ArtifactRef {
        &self.artifact
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.artifact.metadata
    }

    pub fn size_bytes(&self) -> u64 {
        self.artifact.size_bytes
    }

    /// 读取全部字节并释放引用
    pub async fn read_all(mut self) -> Result<Vec<u8>, ApplicationError> {
        let mut data = Vec::with_capacity(self.artifact.size_bytes as usize);
        let read = self.file.read_to_end(&mut data).await;
        self.finish().await?;
        read.map_err(|e| ApplicationError::StorageError(e.to_string()))?;
        Ok(data)
    }

    /// 交付完成，释放引用
    pub async fn finish(mut self) -> Result<bool, ApplicationError> {
        match self.lifecycle.take() {
            Some(lifecycle) => {
                let deleted = lifecycle.release(&self.artifact).await?;
                tracing::info!(
                    handle = %self.handle,
                    key = %self.artifact.key,
                    deleted = deleted,
                    "Full delivery finished"
                );
                Ok(deleted)
            }
            None => Ok(false),
        }
    }
}

impl AsyncRead for FullDelivery {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

impl Drop for FullDelivery {
    fn drop(&mut self) {
        let Some(lifecycle) = self.lifecycle.take() else {
            return;
        };
        let artifact = self.artifact.clone();
        let handle = self.handle;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = lifecycle.release(&artifact).await {
                        tracing::warn!(handle = %handle, error = %e, "Failed to release artifact");
                    } else {
                        tracing::debug!(handle = %handle, "Released artifact after stream drop");
                    }
                });
            }
            // 运行时之外被丢弃：在临时运行时中同步释放
            Err(_) => {
                let released = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map(|runtime| runtime.block_on(lifecycle.release(&artifact)));
                match released {
                    Ok(Ok(_)) => {
                        tracing::debug!(handle = %handle, "Released artifact outside runtime");
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(handle = %handle, error = %e, "Failed to release artifact");
                    }
                    Err(e) => {
                        tracing::warn!(handle = %handle, error = %e, "No runtime to release artifact, it stays pinned");
                    }
                }
            }
        }
    }
}
