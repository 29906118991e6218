//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::{
    // Command handlers
    PipelineSettings, RequestFullHandler, SubmitQueryHandler,
    // Query handlers
    GetLyricsHandler, GetRequesterHandler, GetStatsHandler, SetLanguageHandler,
    // Ports
    ArtifactLifecyclePort, ContentStorePort, ExtractorPort, LyricsPort, PreviewSynthesizerPort,
    RequesterRepositoryPort,
};

/// 应用状态
///
/// 歌词与请求者统计是可选能力，未启用时对应 handler 为 None
pub struct AppState {
    // ========== Command Handlers ==========
    pub submit_query_handler: SubmitQueryHandler,
    pub request_full_handler: RequestFullHandler,

    // ========== Query Handlers ==========
    pub get_stats_handler: GetStatsHandler,
    pub get_lyrics_handler: Option<GetLyricsHandler>,
    pub get_requester_handler: Option<GetRequesterHandler>,
    pub set_language_handler: Option<SetLanguageHandler>,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        extractor: Arc<dyn ExtractorPort>,
        store: Arc<dyn ContentStorePort>,
        preview: Arc<dyn PreviewSynthesizerPort>,
        lifecycle: Arc<dyn ArtifactLifecyclePort>,
        lyrics: Option<Arc<dyn LyricsPort>>,
        requesters: Option<Arc<dyn RequesterRepositoryPort>>,
        settings: PipelineSettings,
    ) -> Self {
        let submit_query_handler = match &requesters {
            Some(repo) => SubmitQueryHandler::with_requesters(
                extractor,
                store.clone(),
                preview,
                lifecycle.clone(),
                repo.clone(),
                settings,
            ),
            None => SubmitQueryHandler::new(
                extractor,
                store.clone(),
                preview,
                lifecycle.clone(),
                settings,
            ),
        };

        Self {
            request_full_handler: RequestFullHandler::new(store.clone(), lifecycle.clone()),
            get_stats_handler: GetStatsHandler::new(
                store,
                lifecycle,
                submit_query_handler.clone(),
            ),
            submit_query_handler,
            get_lyrics_handler: lyrics.map(GetLyricsHandler::new),
            get_requester_handler: requesters.clone().map(GetRequesterHandler::new),
            set_language_handler: requesters.map(SetLanguageHandler::new),
        }
    }
}
