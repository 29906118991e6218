//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod artifact_lifecycle;
mod content_store;
mod extractor;
mod lyrics;
mod preview_synthesizer;
mod repositories;

pub use artifact_lifecycle::{
    ArtifactLifecyclePort, ConsumedArtifact, HandleError, LifecycleStats, RetentionLease,
    SweepReport,
};
pub use content_store::{ArtifactRef, ContentStorePort, StoreError, StoreStats};
pub use extractor::{ExtractionError, ExtractorPort, FetchedAudio, ResolvedMedia};
pub use lyrics::{LyricsError, LyricsPort};
pub use preview_synthesizer::{
    PreviewArtifact, PreviewError, PreviewSynthesizerPort, DEFAULT_PREVIEW_SECONDS,
};
pub use repositories::{RepositoryError, RequesterRecord, RequesterRepositoryPort};
