//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.local.toml 覆盖 config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, ExtractorKind};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 环境变量前缀
const ENV_PREFIX: &str = "TUNEDROP";

/// 预览时长允许范围（秒）
const PREVIEW_SECONDS_RANGE: std::ops::RangeInclusive<u64> = 1..=300;

/// 加载应用配置
///
/// # 环境变量示例
/// - `TUNEDROP_SERVER__PORT=8080`
/// - `TUNEDROP_EXTRACTOR__KIND=fake`
/// - `TUNEDROP_RETENTION__POLICY=ttl`
/// - `TUNEDROP_STORAGE__ROOT_DIR=/var/lib/tunedrop`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let d = AppConfig::default();
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", d.server.host.clone())?
        .set_default("server.port", i64::from(d.server.port))?
        .set_default("extractor.kind", "ytdlp")?
        .set_default("extractor.binary", d.extractor.binary.clone())?
        .set_default("extractor.search_prefix", d.extractor.search_prefix.clone())?
        .set_default("extractor.audio_format", d.extractor.audio_format.extension())?
        .set_default("extractor.timeout_secs", d.extractor.timeout_secs as i64)?
        .set_default("extractor.max_retries", i64::from(d.extractor.max_retries))?
        .set_default("extractor.retry_backoff_ms", d.extractor.retry_backoff_ms as i64)?
        .set_default(
            "storage.root_dir",
            d.storage.root_dir.to_string_lossy().to_string(),
        )?
        .set_default(
            "storage.scratch_dir",
            d.storage.scratch_dir.to_string_lossy().to_string(),
        )?
        .set_default("preview.max_seconds", d.preview.max_seconds as i64)?
        .set_default("retention.policy", d.retention.policy.as_str())?
        .set_default("retention.handle_ttl_secs", d.retention.handle_ttl_secs as i64)?
        .set_default("retention.artifact_ttl_secs", d.retention.artifact_ttl_secs as i64)?
        .set_default(
            "retention.sweep_interval_secs",
            d.retention.sweep_interval_secs as i64,
        )?
        .set_default(
            "retention.tombstone_ttl_secs",
            d.retention.tombstone_ttl_secs as i64,
        )?
        .set_default(
            "pipeline.max_concurrent_downloads",
            d.pipeline.max_concurrent_downloads as i64,
        )?
        .set_default("lyrics.enabled", d.lyrics.enabled)?
        .set_default("lyrics.url", d.lyrics.url.clone())?
        .set_default("lyrics.timeout_secs", d.lyrics.timeout_secs as i64)?
        .set_default("database.enabled", d.database.enabled)?
        .set_default("database.path", d.database.path.clone())?
        .set_default("database.max_connections", i64::from(d.database.max_connections))?
        .set_default("log.level", d.log.level.clone())?
        .set_default("log.json", d.log.json)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级），层级分隔符为双下划线
    // 例如: TUNEDROP_LYRICS__ENABLED=false
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("Server port cannot be 0"));
    }

    if config.extractor.kind == ExtractorKind::Ytdlp && config.extractor.binary.trim().is_empty() {
        return Err(invalid("Extractor binary cannot be empty"));
    }

    if config.extractor.search_prefix.contains(':') {
        return Err(invalid("Extractor search_prefix must not contain ':'"));
    }

    if !PREVIEW_SECONDS_RANGE.contains(&config.preview.max_seconds) {
        return Err(ConfigError::ValidationError(format!(
            "Preview max_seconds must be within {}..={}",
            PREVIEW_SECONDS_RANGE.start(),
            PREVIEW_SECONDS_RANGE.end()
        )));
    }

    let retention = &config.retention;
    if retention.handle_ttl_secs == 0
        || retention.artifact_ttl_secs == 0
        || retention.tombstone_ttl_secs == 0
    {
        return Err(invalid("Retention TTLs cannot be 0"));
    }

    if retention.sweep_interval_secs == 0 {
        return Err(invalid("Sweep interval cannot be 0"));
    }

    if config.pipeline.max_concurrent_downloads == 0 {
        return Err(invalid("max_concurrent_downloads cannot be 0"));
    }

    if config.lyrics.enabled && config.lyrics.url.trim().is_empty() {
        return Err(invalid("Lyrics URL cannot be empty when lyrics are enabled"));
    }

    if config.database.enabled && config.database.path.is_empty() {
        return Err(invalid("Database path cannot be empty"));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("Extractor: {:?} ({})", config.extractor.kind, config.extractor.binary);
    tracing::info!("Search Prefix: {}", config.extractor.search_prefix);
    tracing::info!("Audio Format: {}", config.extractor.audio_format);
    tracing::info!("Store Root: {:?}", config.storage.root_dir);
    tracing::info!("Scratch Dir: {:?}", config.storage.scratch_dir);
    tracing::info!("Preview Max: {}s", config.preview.max_seconds);
    tracing::info!("Retention Policy: {}", config.retention.policy.as_str());
    tracing::info!("Handle TTL: {}s", config.retention.handle_ttl_secs);
    tracing::info!("Sweep Interval: {}s", config.retention.sweep_interval_secs);
    tracing::info!(
        "Max Concurrent Downloads: {}",
        config.pipeline.max_concurrent_downloads
    );
    tracing::info!("Lyrics Enabled: {}", config.lyrics.enabled);
    if config.database.enabled {
        tracing::info!("Database: {}", config.database.path);
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_binary() {
        let mut config = AppConfig::default();
        config.extractor.binary = "  ".to_string();
        assert!(validate_config(&config).is_err());

        config.extractor.kind = ExtractorKind::Fake;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_preview_range() {
        let mut config = AppConfig::default();
        config.preview.max_seconds = 0;
        assert!(validate_config(&config).is_err());
        config.preview.max_seconds = 301;
        assert!(validate_config(&config).is_err());
        config.preview.max_seconds = 300;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_ttl_and_interval() {
        let mut config = AppConfig::default();
        config.retention.handle_ttl_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.retention.sweep_interval_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.pipeline.max_concurrent_downloads = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[extractor]
kind = "fake"

[retention]
policy = "ttl"
handle_ttl_secs = 90

[preview]
max_seconds = 12
"#
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.extractor.kind, ExtractorKind::Fake);
        assert_eq!(
            config.retention.policy,
            crate::domain::retention::RetentionPolicy::Ttl
        );
        assert_eq!(config.retention.handle_ttl_secs, 90);
        assert_eq!(config.preview.max_seconds, 12);
        assert_eq!(config.server.port, 5070);
    }
}
