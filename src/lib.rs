//! tunedrop - 聊天机器人音乐下载流水线
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Track Context: 查询解析、媒体标识、元数据
//! - Retention Context: 保留句柄与策略
//! - Pipeline Context: 请求状态机
//!
//! 应用层 (application/):
//! - Ports: 端口定义（Extractor, ContentStore, PreviewSynthesizer, ArtifactLifecycle, Lyrics, Repositories）
//! - Commands: 查询提交与完整交付
//! - Queries: 歌词、请求者统计、运行统计
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API
//! - Memory: 生命周期管理内存实现
//! - Worker: SweepWorker 周期清扫
//! - Persistence: Sled 制品索引 + SQLite 请求者统计
//! - Adapters: yt-dlp / Fake 提取器, 文件内容存储, symphonia 预览, 歌词客户端

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
