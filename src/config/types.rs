//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::PipelineSettings;
use crate::domain::retention::RetentionPolicy;
use crate::domain::track::AudioFormat;
use crate::infrastructure::adapters::{HttpLyricsClientConfig, YtDlpConfig};
use crate::infrastructure::memory::LifecycleConfig;
use crate::infrastructure::persistence::sqlite::DatabaseConfig as SqliteDatabaseConfig;
use crate::infrastructure::worker::SweepWorkerConfig;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub lyrics: LyricsConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 流水线参数
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            preview_max: Duration::from_secs(self.preview.max_seconds),
            handle_ttl: Duration::from_secs(self.retention.handle_ttl_secs),
            max_concurrent_downloads: self.pipeline.max_concurrent_downloads,
            scratch_dir: self.storage.scratch_dir.clone(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 提取器实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    #[default]
    Ytdlp,
    /// 离线假实现，仅用于本地调试
    Fake,
}

/// 提取器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default)]
    pub kind: ExtractorKind,

    /// yt-dlp 可执行文件
    #[serde(default = "default_binary")]
    pub binary: String,

    /// 搜索前缀（不含冒号）
    #[serde(default = "default_search_prefix")]
    pub search_prefix: String,

    /// 下载后的音频格式
    #[serde(default = "default_audio_format")]
    pub audio_format: AudioFormat,

    /// 单次调用超时（秒）
    #[serde(default = "default_extractor_timeout")]
    pub timeout_secs: u64,

    /// 网络失败最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 重试退避基数（毫秒）
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// 透传给 yt-dlp 的额外参数
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_binary() -> String {
    "yt-dlp".to_string()
}

fn default_search_prefix() -> String {
    "ytsearch1".to_string()
}

fn default_audio_format() -> AudioFormat {
    AudioFormat::Mp3
}

fn default_extractor_timeout() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    1000
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            kind: ExtractorKind::default(),
            binary: default_binary(),
            search_prefix: default_search_prefix(),
            audio_format: default_audio_format(),
            timeout_secs: default_extractor_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            extra_args: Vec::new(),
        }
    }
}

impl ExtractorConfig {
    pub fn ytdlp(&self) -> YtDlpConfig {
        YtDlpConfig {
            binary: self.binary.clone(),
            search_prefix: self.search_prefix.clone(),
            audio_format: self.audio_format,
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            extra_args: self.extra_args.clone(),
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 内容存储根目录
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// 下载临时目录
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("data/artifacts")
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("data/scratch")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

/// 预览配置
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewConfig {
    /// 预览最大时长（秒）
    #[serde(default = "default_preview_seconds")]
    pub max_seconds: u64,
}

fn default_preview_seconds() -> u64 {
    crate::application::ports::DEFAULT_PREVIEW_SECONDS
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_seconds: default_preview_seconds(),
        }
    }
}

/// 保留配置
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// single_use | ttl
    #[serde(default)]
    pub policy: RetentionPolicy,

    /// 保留句柄有效期（秒）
    #[serde(default = "default_handle_ttl")]
    pub handle_ttl_secs: u64,

    /// 无引用制品保留时间（秒），仅 ttl 策略使用
    #[serde(default = "default_artifact_ttl")]
    pub artifact_ttl_secs: u64,

    /// 清扫间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// 过期句柄墓碑保留时间（秒）
    #[serde(default = "default_tombstone_ttl")]
    pub tombstone_ttl_secs: u64,
}

fn default_handle_ttl() -> u64 {
    600 // 10 分钟
}

fn default_artifact_ttl() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_tombstone_ttl() -> u64 {
    86400
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            policy: RetentionPolicy::default(),
            handle_ttl_secs: default_handle_ttl(),
            artifact_ttl_secs: default_artifact_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            tombstone_ttl_secs: default_tombstone_ttl(),
        }
    }
}

impl RetentionConfig {
    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            policy: self.policy,
            artifact_ttl: Duration::from_secs(self.artifact_ttl_secs),
            tombstone_ttl: Duration::from_secs(self.tombstone_ttl_secs),
        }
    }

    pub fn sweep_worker(&self) -> SweepWorkerConfig {
        SweepWorkerConfig {
            interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

/// 流水线配置
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// 同时进行的下载数上限
    #[serde(default = "default_max_downloads")]
    pub max_concurrent_downloads: usize,
}

fn default_max_downloads() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_downloads(),
        }
    }
}

/// 歌词服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct LyricsConfig {
    #[serde(default = "default_lyrics_enabled")]
    pub enabled: bool,

    #[serde(default = "default_lyrics_url")]
    pub url: String,

    #[serde(default = "default_lyrics_timeout")]
    pub timeout_secs: u64,
}

fn default_lyrics_enabled() -> bool {
    true
}

fn default_lyrics_url() -> String {
    "https://api.lyrics.ovh".to_string()
}

fn default_lyrics_timeout() -> u64 {
    10
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_lyrics_enabled(),
            url: default_lyrics_url(),
            timeout_secs: default_lyrics_timeout(),
        }
    }
}

impl LyricsConfig {
    pub fn client(&self) -> HttpLyricsClientConfig {
        HttpLyricsClientConfig {
            base_url: self.url.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// 数据库配置（请求者统计）
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub enabled: bool,

    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/tunedrop.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn sqlite(&self) -> SqliteDatabaseConfig {
        SqliteDatabaseConfig::new(&self.path, self.max_connections)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5070);
        assert_eq!(config.extractor.kind, ExtractorKind::Ytdlp);
        assert_eq!(config.extractor.search_prefix, "ytsearch1");
        assert_eq!(config.preview.max_seconds, 30);
        assert_eq!(config.retention.policy, RetentionPolicy::SingleUse);
        assert!(!config.database.enabled);
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:5070");
    }

    #[test]
    fn test_pipeline_settings_follow_sections() {
        let mut config = AppConfig::default();
        config.preview.max_seconds = 15;
        config.retention.handle_ttl_secs = 120;
        config.pipeline.max_concurrent_downloads = 2;
        let settings = config.pipeline_settings();
        assert_eq!(settings.preview_max, Duration::from_secs(15));
        assert_eq!(settings.handle_ttl, Duration::from_secs(120));
        assert_eq!(settings.max_concurrent_downloads, 2);
        assert_eq!(settings.scratch_dir, PathBuf::from("data/scratch"));
    }

    #[test]
    fn test_ytdlp_config_conversion() {
        let config = ExtractorConfig {
            retry_backoff_ms: 250,
            ..ExtractorConfig::default()
        };
        let ytdlp = config.ytdlp();
        assert_eq!(ytdlp.retry_backoff, Duration::from_millis(250));
        assert_eq!(ytdlp.binary, "yt-dlp");
    }
}
