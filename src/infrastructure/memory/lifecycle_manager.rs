//! In-Memory Artifact Lifecycle Manager
//!
//! 保留句柄、制品引用计数与 TTL 清扫，全部状态在一把 `tokio::sync::Mutex` 之下

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::application::ports::{
    ArtifactLifecyclePort, ArtifactRef, ConsumedArtifact, ContentStorePort, HandleError,
    LifecycleStats, RetentionLease, SweepReport,
};
use crate::domain::retention::{RetentionHandle, RetentionPolicy};
use crate::domain::track::ArtifactKey;

/// 生命周期配置
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub policy: RetentionPolicy,
    /// 无引用制品的保留时间
    pub artifact_ttl: Duration,
    /// 过期句柄的墓碑保留时间（期间 consume 返回 Expired 而非 NotFound）
    pub tombstone_ttl: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            policy: RetentionPolicy::SingleUse,
            artifact_ttl: Duration::from_secs(3600),
            tombstone_ttl: Duration::from_secs(86400),
        }
    }
}

#[derive(Debug, Clone)]
struct HandleEntry {
    requester_id: String,
    artifact: ArtifactRef,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct LifecycleState {
    handles: HashMap<RetentionHandle, HandleEntry>,
    /// 制品引用计数（未消费句柄 + 交付中的流）
    refs: HashMap<ArtifactKey, usize>,
    /// 过期句柄 -> 过期时间
    tombstones: HashMap<RetentionHandle, DateTime<Utc>>,
    /// 引用归零的时间
    last_used: HashMap<ArtifactKey, DateTime<Utc>>,
}

/// 超出范围的时长按一百年处理
fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d)
        .unwrap_or_else(|_| chrono::Duration::days(36_500))
        .min(chrono::Duration::days(36_500))
}

/// 内存生命周期管理器
pub struct InMemoryLifecycleManager {
    store: Arc<dyn ContentStorePort>,
    config: LifecycleConfig,
    state: Mutex<LifecycleState>,
}

impl InMemoryLifecycleManager {
    pub fn new(store: Arc<dyn ContentStorePort>, config: LifecycleConfig) -> Self {
        tracing::info!(
            policy = config.policy.as_str(),
            artifact_ttl_secs = config.artifact_ttl.as_secs(),
            "InMemoryLifecycleManager initialized"
        );
        Self {
            store,
            config,
            state: Mutex::new(LifecycleState::default()),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 减少一次引用；归零且为 single_use 时删除制品，返回是否删除
    async fn release_locked(
        &self,
        state: &mut LifecycleState,
        artifact: &ArtifactRef,
        now: DateTime<Utc>,
    ) -> Result<bool, HandleError> {
        let remaining = match state.refs.get_mut(&artifact.key) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => {
                tracing::warn!(key = %artifact.key, "Release without reference");
                return Ok(false);
            }
        };
        if remaining > 0 {
            return Ok(false);
        }

        state.refs.remove(&artifact.key);
        match self.config.policy {
            RetentionPolicy::SingleUse => {
                self.store
                    .delete(artifact)
                    .await
                    .map_err(|e| HandleError::Store(e.to_string()))?;
                state.last_used.remove(&artifact.key);
                tracing::info!(key = %artifact.key, "Artifact deleted after last release");
                Ok(true)
            }
            RetentionPolicy::Ttl => {
                state.last_used.insert(artifact.key.clone(), now);
                Ok(false)
            }
        }
    }

    /// 过期句柄并清理旧墓碑，返回 (过期句柄数, 删除制品数)
    async fn expire_locked(&self, state: &mut LifecycleState, now: DateTime<Utc>) -> (usize, usize) {
        let expired: Vec<RetentionHandle> = state
            .handles
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(handle, _)| *handle)
            .collect();

        let mut deleted = 0;
        for handle in &expired {
            if let Some(entry) = state.handles.remove(handle) {
                state.tombstones.insert(*handle, now);
                tracing::debug!(handle = %handle, requester_id = %entry.requester_id, "Handle expired");
                match self.release_locked(state, &entry.artifact, now).await {
                    Ok(true) => deleted += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(handle = %handle, error = %e, "Release on expiry failed"),
                }
            }
        }

        let tombstone_ttl = chrono_duration(self.config.tombstone_ttl);
        state
            .tombstones
            .retain(|_, expired_at| now.signed_duration_since(*expired_at) < tombstone_ttl);

        (expired.len(), deleted)
    }
}

#[async_trait]
impl ArtifactLifecyclePort for InMemoryLifecycleManager {
    async fn register(
        &self,
        requester_id: &str,
        artifact: &ArtifactRef,
        ttl: Duration,
    ) -> Result<RetentionLease, HandleError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        self.expire_locked(&mut state, now).await;

        // 制品可能在下载完成后被并发删除
        match self.store.get(&artifact.key).await {
            Ok(Some(current)) if current.path == artifact.path => {}
            Ok(_) => return Err(HandleError::ArtifactGone(artifact.key.to_string())),
            Err(e) => return Err(HandleError::Store(e.to_string())),
        }

        let handle = RetentionHandle::new();
        let expires_at = now + chrono_duration(ttl);
        *state.refs.entry(artifact.key.clone()).or_insert(0) += 1;
        state.last_used.remove(&artifact.key);
        state.handles.insert(
            handle,
            HandleEntry {
                requester_id: requester_id.to_string(),
                artifact: artifact.clone(),
                expires_at,
            },
        );

        tracing::debug!(
            handle = %handle,
            requester_id = %requester_id,
            key = %artifact.key,
            refs = state.refs.get(&artifact.key).copied().unwrap_or(0),
            "Handle registered"
        );

        Ok(RetentionLease {
            handle,
            requester_id: requester_id.to_string(),
            key: artifact.key.clone(),
            expires_at,
        })
    }

    async fn consume(&self, handle: &RetentionHandle) -> Result<ConsumedArtifact, HandleError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let Some(entry) = state.handles.remove(handle) else {
            return if state.tombstones.contains_key(handle) {
                Err(HandleError::Expired(handle.to_string()))
            } else {
                Err(HandleError::NotFound(handle.to_string()))
            };
        };

        if entry.expires_at <= now {
            state.tombstones.insert(*handle, now);
            if let Err(e) = self.release_locked(&mut state, &entry.artifact, now).await {
                tracing::warn!(handle = %handle, error = %e, "Release of expired handle failed");
            }
            return Err(HandleError::Expired(handle.to_string()));
        }

        // 引用从句柄转移给交付流，直到 release
        tracing::debug!(handle = %handle, key = %entry.artifact.key, "Handle consumed");
        Ok(ConsumedArtifact {
            handle: *handle,
            requester_id: entry.requester_id,
            artifact: entry.artifact,
        })
    }

    async fn release(&self, artifact: &ArtifactRef) -> Result<bool, HandleError> {
        let mut state = self.state.lock().await;
        self.release_locked(&mut state, artifact, Utc::now()).await
    }

    async fn revoke(&self, handle: &RetentionHandle) -> Result<(), HandleError> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.handles.remove(handle) {
            tracing::debug!(handle = %handle, "Handle revoked");
            self.release_locked(&mut state, &entry.artifact, Utc::now())
                .await?;
        }
        Ok(())
    }

    async fn sweep(&self) -> SweepReport {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let (expired_handles, deleted_artifacts) = self.expire_locked(&mut state, now).await;

        let mut reclaimed_artifacts = 0;
        let artifact_ttl = chrono_duration(self.config.artifact_ttl);
        match self.store.list().await {
            Ok(artifacts) => {
                for artifact in artifacts {
                    if state.refs.contains_key(&artifact.key) {
                        continue;
                    }
                    let idle_since = state
                        .last_used
                        .get(&artifact.key)
                        .copied()
                        .unwrap_or(artifact.created_at);
                    if now.signed_duration_since(idle_since) < artifact_ttl {
                        continue;
                    }
                    match self.store.delete(&artifact).await {
                        Ok(()) => {
                            state.last_used.remove(&artifact.key);
                            reclaimed_artifacts += 1;
                            tracing::debug!(key = %artifact.key, "Reclaimed idle artifact");
                        }
                        Err(e) => {
                            tracing::warn!(key = %artifact.key, error = %e, "Failed to reclaim artifact")
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to list artifacts for sweep"),
        }

        let report = SweepReport {
            expired_handles,
            deleted_artifacts,
            reclaimed_artifacts,
        };
        if report != SweepReport::default() {
            tracing::info!(
                expired_handles = report.expired_handles,
                deleted_artifacts = report.deleted_artifacts,
                reclaimed_artifacts = report.reclaimed_artifacts,
                "Sweep complete"
            );
        }
        report
    }

    async fn stats(&self) -> LifecycleStats {
        let state = self.state.lock().await;
        LifecycleStats {
            live_handles: state.handles.len(),
            pinned_artifacts: state.refs.len(),
            tombstones: state.tombstones.len(),
        }
    }
}
