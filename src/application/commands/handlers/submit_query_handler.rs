//! SubmitQuery Handler - 解析、下载、缓存、预览

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use crate::application::commands::pipeline_commands::*;
use crate::application::error::ApplicationError;
use crate::application::inflight::{InFlight, Join};
use crate::application::ports::{
    ArtifactLifecyclePort, ArtifactRef, ContentStorePort, ExtractorPort, HandleError,
    PreviewArtifact, PreviewSynthesizerPort, RequesterRepositoryPort, ResolvedMedia, StoreError,
    DEFAULT_PREVIEW_SECONDS,
};
use crate::domain::pipeline::{PipelineState, PipelineTracker};
use crate::domain::retention::RetentionHandle;
use crate::domain::track::{ArtifactKey, Query};

/// 事件缓冲区大小
const EVENT_BUFFER: usize = 16;

/// 下载临时目录前缀
pub const SCRATCH_PREFIX: &str = "fetch-";

/// 删除临时目录中残留的下载目录（上次进程中断时留下）
///
/// 只能在没有下载进行时调用，返回删除的条目数
pub async fn purge_scratch(scratch_dir: &Path) -> Result<usize, StoreError> {
    let mut entries = match tokio::fs::read_dir(scratch_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StoreError::Io(e.to_string())),
    };

    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
    {
        if !entry.file_name().to_string_lossy().starts_with(SCRATCH_PREFIX) {
            continue;
        }
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let result = if file_type.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match result {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed stale scratch entry");
                removed += 1;
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch entry"),
        }
    }

    if removed > 0 {
        tracing::info!(removed = removed, "Scratch directory purged");
    }
    Ok(removed)
}

/// 流水线参数
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// 预览最大时长
    pub preview_max: Duration,
    /// 保留句柄有效期
    pub handle_ttl: Duration,
    /// 同时进行的下载数上限
    pub max_concurrent_downloads: usize,
    /// 下载临时目录的父目录
    pub scratch_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            preview_max: Duration::from_secs(DEFAULT_PREVIEW_SECONDS),
            handle_ttl: Duration::from_secs(600),
            max_concurrent_downloads: 4,
            scratch_dir: std::env::temp_dir().join("tunedrop"),
        }
    }
}

type DownloadResult = Result<ArtifactRef, ApplicationError>;

struct PipelineInner {
    extractor: Arc<dyn ExtractorPort>,
    store: Arc<dyn ContentStorePort>,
    preview: Arc<dyn PreviewSynthesizerPort>,
    lifecycle: Arc<dyn ArtifactLifecyclePort>,
    requesters: Option<Arc<dyn RequesterRepositoryPort>>,
    inflight: InFlight<ArtifactKey, DownloadResult>,
    downloads: Semaphore,
    settings: PipelineSettings,
}

/// 事件出口，`run` 模式下没有订阅方
struct EventSink {
    sender: Option<mpsc::Sender<PipelineEvent>>,
}

impl EventSink {
    async fn emit(&self, event: PipelineEvent) -> Result<(), ApplicationError> {
        match &self.sender {
            Some(sender) => sender
                .send(event)
                .await
                .map_err(|_| ApplicationError::Cancelled),
            None => Ok(()),
        }
    }

    fn ensure_open(&self) -> Result<(), ApplicationError> {
        match &self.sender {
            Some(sender) if sender.is_closed() => Err(ApplicationError::Cancelled),
            _ => Ok(()),
        }
    }

    async fn closed(&self) {
        match &self.sender {
            Some(sender) => sender.closed().await,
            None => std::future::pending().await,
        }
    }
}

/// SubmitQuery Handler
///
/// 每次提交在独立任务中运行；下载在分离任务中运行，
/// 单个请求方取消不会中止其他请求方等待的下载
#[derive(Clone)]
pub struct SubmitQueryHandler {
    inner: Arc<PipelineInner>,
}

impl SubmitQueryHandler {
    pub fn new(
        extractor: Arc<dyn ExtractorPort>,
        store: Arc<dyn ContentStorePort>,
        preview: Arc<dyn PreviewSynthesizerPort>,
        lifecycle: Arc<dyn ArtifactLifecyclePort>,
        settings: PipelineSettings,
    ) -> Self {
        Self::build(extractor, store, preview, lifecycle, None, settings)
    }

    /// 附带请求者统计
    pub fn with_requesters(
        extractor: Arc<dyn ExtractorPort>,
        store: Arc<dyn ContentStorePort>,
        preview: Arc<dyn PreviewSynthesizerPort>,
        lifecycle: Arc<dyn ArtifactLifecyclePort>,
        requesters: Arc<dyn RequesterRepositoryPort>,
        settings: PipelineSettings,
    ) -> Self {
        Self::build(extractor, store, preview, lifecycle, Some(requesters), settings)
    }

    fn build(
        extractor: Arc<dyn ExtractorPort>,
        store: Arc<dyn ContentStorePort>,
        preview: Arc<dyn PreviewSynthesizerPort>,
        lifecycle: Arc<dyn ArtifactLifecyclePort>,
        requesters: Option<Arc<dyn RequesterRepositoryPort>>,
        settings: PipelineSettings,
    ) -> Self {
        let permits = settings.max_concurrent_downloads.max(1);
        Self {
            inner: Arc::new(PipelineInner {
                extractor,
                store,
                preview,
                lifecycle,
                requesters,
                inflight: InFlight::new(),
                downloads: Semaphore::new(permits),
                settings,
            }),
        }
    }

    /// 提交查询，返回事件订阅
    pub fn handle(&self, cmd: SubmitQueryCommand) -> PipelineSubscription {
        let (sender, receiver) = mpsc::channel(EVENT_BUFFER);
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let sink = EventSink {
                sender: Some(sender.clone()),
            };
            match inner.execute(&cmd, &sink).await {
                Ok(ready) => {
                    if let Err(mpsc::error::SendError(PipelineEvent::PreviewReady(ready))) =
                        sender.send(PipelineEvent::PreviewReady(ready)).await
                    {
                        tracing::info!(
                            requester_id = %cmd.requester_id,
                            handle = %ready.handle,
                            "Subscriber left before preview, revoking handle"
                        );
                        inner.abandon(&ready.handle).await;
                    }
                }
                Err(ApplicationError::Cancelled) => {
                    tracing::info!(requester_id = %cmd.requester_id, "Pipeline cancelled");
                }
                Err(e) => {
                    tracing::warn!(
                        requester_id = %cmd.requester_id,
                        kind = e.kind(),
                        error = %e,
                        "Pipeline failed"
                    );
                    let _ = sender.send(PipelineEvent::failed(&e)).await;
                }
            }
        });

        PipelineSubscription::new(receiver)
    }

    /// 运行流水线并直接返回结果（不产生事件）
    pub async fn run(&self, cmd: SubmitQueryCommand) -> Result<PreviewReady, ApplicationError> {
        let sink = EventSink { sender: None };
        self.inner.execute(&cmd, &sink).await
    }

    /// 当前进行中的下载数
    pub fn downloads_in_flight(&self) -> usize {
        self.inner.inflight.len()
    }
}

impl PipelineInner {
    async fn execute(
        self: &Arc<Self>,
        cmd: &SubmitQueryCommand,
        sink: &EventSink,
    ) -> Result<PreviewReady, ApplicationError> {
        let query = Query::parse(&cmd.query)?;
        let mut tracker = PipelineTracker::new();

        tracker.advance(PipelineState::Resolving)?;
        sink.emit(PipelineEvent::Searching).await?;
        self.record_search(&cmd.requester_id).await;

        tracing::info!(
            requester_id = %cmd.requester_id,
            link = query.is_link(),
            "Resolving query"
        );
        let media = match self.cached_media(&query).await? {
            Some(media) => media,
            None => self.extractor.probe(&query).await?,
        };
        sink.ensure_open()?;

        // 注册时制品可能已被并发删除，重试一次
        let mut retried = false;
        let (artifact, lease) = loop {
            let artifact = self.obtain(&media, &mut tracker, sink).await?;
            match self
                .lifecycle
                .register(&cmd.requester_id, &artifact, self.settings.handle_ttl)
                .await
            {
                Ok(lease) => break (artifact, lease),
                Err(HandleError::ArtifactGone(key)) if !retried => {
                    tracing::warn!(key = %key, "Artifact gone before registration, retrying");
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        };

        if sink.ensure_open().is_err() {
            self.abandon(&lease.handle).await;
            return Err(ApplicationError::Cancelled);
        }

        let preview = match self.synthesize(&artifact).await {
            Ok(preview) => preview,
            Err(e) => {
                self.abandon(&lease.handle).await;
                return Err(e);
            }
        };
        tracker.advance(PipelineState::PreviewReady)?;

        tracing::info!(
            requester_id = %cmd.requester_id,
            key = %artifact.key,
            handle = %lease.handle,
            preview_ms = preview.duration_ms,
            "Preview ready"
        );

        Ok(PreviewReady {
            key: artifact.key.clone(),
            metadata: artifact.metadata.clone(),
            preview,
            handle: lease.handle,
            expires_at: lease.expires_at,
        })
    }

    /// 链接可离线确定制品键；已缓存时直接使用存储的元数据，跳过 probe
    async fn cached_media(&self, query: &Query) -> Result<Option<ResolvedMedia>, ApplicationError> {
        let Some(key) = query.known_key() else {
            return Ok(None);
        };
        let Some(artifact) = self.store.get(&key).await? else {
            return Ok(None);
        };
        tracing::debug!(key = %key, track = %artifact.metadata.display_name(), "Link resolved from store");
        Ok(Some(ResolvedMedia {
            key,
            fetch_target: query.extractor_target(""),
            metadata: artifact.metadata,
        }))
    }

    /// 命中缓存或等待（必要时发起）下载
    async fn obtain(
        self: &Arc<Self>,
        media: &ResolvedMedia,
        tracker: &mut PipelineTracker,
        sink: &EventSink,
    ) -> Result<ArtifactRef, ApplicationError> {
        if let Some(artifact) = self.store.get(&media.key).await? {
            tracker.advance(PipelineState::Cached)?;
            sink.emit(PipelineEvent::Cached {
                key: media.key.clone(),
                reused: true,
            })
            .await?;
            return Ok(artifact);
        }

        if tracker.current() == PipelineState::Resolving {
            tracker.advance(PipelineState::Downloading)?;
        }
        sink.emit(PipelineEvent::Downloading {
            key: media.key.clone(),
        })
        .await?;

        let waiter = match self.inflight.join(&media.key) {
            Join::Leader(completion, waiter) => {
                let inner = Arc::clone(self);
                let media = media.clone();
                tokio::spawn(async move {
                    let result = inner.download(&media).await;
                    completion.complete(result);
                });
                waiter
            }
            Join::Follower(waiter) => {
                tracing::debug!(key = %media.key, "Joining in-flight download");
                waiter
            }
        };

        let result = tokio::select! {
            result = waiter.wait() => result,
            _ = sink.closed() => return Err(ApplicationError::Cancelled),
        };
        let artifact = result.ok_or(ApplicationError::FetchFailed { kind: "aborted" })??;

        tracker.advance(PipelineState::Cached)?;
        sink.emit(PipelineEvent::Cached {
            key: media.key.clone(),
            reused: false,
        })
        .await?;
        Ok(artifact)
    }

    /// 下载任务本体，临时目录在任何退出路径上都会被清理
    async fn download(&self, media: &ResolvedMedia) -> DownloadResult {
        let _permit = self
            .downloads
            .acquire()
            .await
            .map_err(|_| ApplicationError::internal("download limiter closed"))?;

        if let Some(existing) = self.store.get(&media.key).await? {
            tracing::debug!(key = %media.key, "Artifact appeared while queued");
            return Ok(existing);
        }

        tokio::fs::create_dir_all(&self.settings.scratch_dir)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.settings.scratch_dir)
            .map_err(|e| StoreError::Io(e.to_string()))?;

        tracing::info!(
            key = %media.key,
            track = %media.metadata.display_name(),
            "Downloading"
        );
        let fetched = self.extractor.fetch(media, scratch.path()).await?;
        let artifact = self
            .store
            .put(&media.key, &fetched.path, fetched.format, media.metadata.clone())
            .await?;

        tracing::info!(
            key = %artifact.key,
            size_bytes = artifact.size_bytes,
            "Artifact stored"
        );
        Ok(artifact)
    }

    async fn synthesize(&self, artifact: &ArtifactRef) -> Result<PreviewArtifact, ApplicationError> {
        let data = self.store.read(artifact).await?;
        let synthesizer = Arc::clone(&self.preview);
        let format = artifact.format;
        let max = self.settings.preview_max;

        let preview = tokio::task::spawn_blocking(move || {
            synthesizer.make_preview(&data, format, max)
        })
        .await
        .map_err(|e| ApplicationError::internal(format!("preview task failed: {}", e)))??;
        Ok(preview)
    }

    async fn abandon(&self, handle: &RetentionHandle) {
        if let Err(e) = self.lifecycle.revoke(handle).await {
            tracing::warn!(handle = %handle, error = %e, "Failed to revoke handle");
        }
    }

    async fn record_search(&self, requester_id: &str) {
        if let Some(repo) = &self.requesters {
            match repo.record_search(requester_id).await {
                Ok(count) => {
                    tracing::debug!(requester_id = %requester_id, count = count, "Search recorded")
                }
                Err(e) => {
                    tracing::warn!(requester_id = %requester_id, error = %e, "Failed to record search")
                }
            }
        }
    }
}
