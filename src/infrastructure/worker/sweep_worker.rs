//! Sweep Worker - 周期性清扫过期句柄与闲置制品

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::ArtifactLifecyclePort;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct SweepWorkerConfig {
    /// 清扫间隔
    pub interval: Duration,
}

impl Default for SweepWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

/// 清扫 Worker
pub struct SweepWorker {
    config: SweepWorkerConfig,
    lifecycle: Arc<dyn ArtifactLifecyclePort>,
    shutdown: CancellationToken,
}

impl SweepWorker {
    pub fn new(
        config: SweepWorkerConfig,
        lifecycle: Arc<dyn ArtifactLifecyclePort>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            lifecycle,
            shutdown,
        }
    }

    /// 在后台启动
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// 运行直到收到关闭信号
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "SweepWorker started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // 第一次 tick 立即完成，跳过它
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.lifecycle.sweep().await;
                    tracing::debug!(
                        expired_handles = report.expired_handles,
                        deleted_artifacts = report.deleted_artifacts,
                        reclaimed_artifacts = report.reclaimed_artifacts,
                        "Periodic sweep"
                    );
                }
            }
        }

        tracing::info!("SweepWorker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{
        ArtifactRef, ConsumedArtifact, HandleError, LifecycleStats, RetentionLease, SweepReport,
    };
    use crate::domain::retention::RetentionHandle;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLifecycle {
        sweeps: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactLifecyclePort for CountingLifecycle {
        async fn register(
            &self,
            _requester_id: &str,
            artifact: &ArtifactRef,
            _ttl: Duration,
        ) -> Result<RetentionLease, HandleError> {
            Err(HandleError::ArtifactGone(artifact.key.to_string()))
        }

        async fn consume(&self, handle: &RetentionHandle) -> Result<ConsumedArtifact, HandleError> {
            Err(HandleError::NotFound(handle.to_string()))
        }

        async fn release(&self, _artifact: &ArtifactRef) -> Result<bool, HandleError> {
            Ok(false)
        }

        async fn revoke(&self, _handle: &RetentionHandle) -> Result<(), HandleError> {
            Ok(())
        }

        async fn sweep(&self) -> SweepReport {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            SweepReport::default()
        }

        async fn stats(&self) -> LifecycleStats {
            LifecycleStats::default()
        }
    }

    #[tokio::test]
    async fn test_sweeps_until_cancelled() {
        let lifecycle = Arc::new(CountingLifecycle::default());
        let shutdown = CancellationToken::new();
        let worker = SweepWorker::new(
            SweepWorkerConfig {
                interval: Duration::from_millis(10),
            },
            lifecycle.clone(),
            shutdown.clone(),
        );

        let handle = worker.spawn();
        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let sweeps = lifecycle.sweeps.load(Ordering::SeqCst);
        assert!(sweeps >= 2, "expected several sweeps, got {}", sweeps);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(lifecycle.sweeps.load(Ordering::SeqCst), sweeps);
    }
}
