//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod http;
pub mod memory;
pub mod persistence;
pub mod worker;

pub use adapters::{
    FakeExtractor, FileContentStore, HttpLyricsClient, HttpLyricsClientConfig,
    SymphoniaPreviewSynthesizer, YtDlpConfig, YtDlpExtractor,
};
pub use memory::{InMemoryLifecycleManager, LifecycleConfig};
pub use persistence::{ArtifactIndex, SqliteRequesterRepository};
pub use worker::{SweepWorker, SweepWorkerConfig};
