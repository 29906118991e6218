//! Requester / Stats Query Handlers

use std::sync::Arc;

use crate::application::commands::handlers::SubmitQueryHandler;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    ArtifactLifecyclePort, ContentStorePort, LifecycleStats, RequesterRecord,
    RequesterRepositoryPort, StoreStats,
};
use crate::application::queries::{GetRequester, GetStats};

// ============================================================================
// Response DTOs
// ============================================================================

/// 请求者统计响应
#[derive(Debug, Clone)]
pub struct RequesterResponse {
    pub requester_id: String,
    pub search_count: u64,
    pub language: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<RequesterRecord> for RequesterResponse {
    fn from(record: RequesterRecord) -> Self {
        Self {
            requester_id: record.requester_id,
            search_count: record.search_count,
            language: record.language,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// 运行统计响应
#[derive(Debug, Clone)]
pub struct StatsResponse {
    pub store: StoreStats,
    pub lifecycle: LifecycleStats,
    pub downloads_in_flight: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GetRequester Handler
pub struct GetRequesterHandler {
    repo: Arc<dyn RequesterRepositoryPort>,
}

impl GetRequesterHandler {
    pub fn new(repo: Arc<dyn RequesterRepositoryPort>) -> Self {
        Self { repo }
    }

    pub async fn handle(&self, query: GetRequester) -> Result<RequesterResponse, ApplicationError> {
        let record = self
            .repo
            .find(&query.requester_id)
            .await?
            .ok_or_else(|| {
                ApplicationError::validation(format!("Requester not found: {}", query.requester_id))
            })?;

        Ok(RequesterResponse::from(record))
    }
}

/// SetLanguage Handler - 设置请求者语言偏好
pub struct SetLanguageHandler {
    repo: Arc<dyn RequesterRepositoryPort>,
}

impl SetLanguageHandler {
    pub fn new(repo: Arc<dyn RequesterRepositoryPort>) -> Self {
        Self { repo }
    }

    pub async fn handle(&self, requester_id: &str, language: &str) -> Result<(), ApplicationError> {
        let language = language.trim().to_lowercase();
        if language.is_empty() || language.len() > 16 {
            return Err(ApplicationError::validation("invalid language code"));
        }
        self.repo.set_language(requester_id, &language).await?;
        tracing::info!(requester_id = %requester_id, language = %language, "Language updated");
        Ok(())
    }
}

/// GetStats Handler
pub struct GetStatsHandler {
    store: Arc<dyn ContentStorePort>,
    lifecycle: Arc<dyn ArtifactLifecyclePort>,
    pipeline: SubmitQueryHandler,
}

impl GetStatsHandler {
    pub fn new(
        store: Arc<dyn ContentStorePort>,
        lifecycle: Arc<dyn ArtifactLifecyclePort>,
        pipeline: SubmitQueryHandler,
    ) -> Self {
        Self {
            store,
            lifecycle,
            pipeline,
        }
    }

    pub async fn handle(&self, _query: GetStats) -> Result<StatsResponse, ApplicationError> {
        Ok(StatsResponse {
            store: self.store.stats().await,
            lifecycle: self.lifecycle.stats().await,
            downloads_in_flight: self.pipeline.downloads_in_flight(),
        })
    }
}
