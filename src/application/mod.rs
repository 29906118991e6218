//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（Extractor、ContentStore、PreviewSynthesizer、ArtifactLifecycle 等）
//! - commands: CQRS 命令及处理器（查询提交、完整交付）
//! - queries: CQRS 查询及处理器（歌词、统计）
//! - inflight: 单飞下载注册表
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod inflight;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    handlers::{purge_scratch, PipelineSettings, RequestFullHandler, SubmitQueryHandler},
    FullDelivery, PipelineEvent, PipelineSubscription, PreviewReady, RequestFullCommand,
    SubmitQueryCommand,
};

pub use error::ApplicationError;

pub use inflight::{InFlight, Join};

pub use ports::{
    ArtifactLifecyclePort, ArtifactRef, ConsumedArtifact, ContentStorePort, ExtractionError,
    ExtractorPort, FetchedAudio, HandleError, LifecycleStats, LyricsError, LyricsPort,
    PreviewArtifact, PreviewError, PreviewSynthesizerPort, RepositoryError, RequesterRecord,
    RequesterRepositoryPort, ResolvedMedia, RetentionLease, StoreError, StoreStats, SweepReport,
};

pub use queries::{
    handlers::{
        GetLyricsHandler, GetRequesterHandler, GetStatsHandler, LyricsResponse,
        RequesterResponse, SetLanguageHandler, StatsResponse,
    },
    GetLyrics, GetRequester, GetStats,
};
