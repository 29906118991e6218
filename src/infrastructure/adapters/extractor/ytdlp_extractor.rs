//! yt-dlp Extractor - 基于 yt-dlp 子进程的媒体提取器
//!
//! 实现 ExtractorPort trait
//!
//! - probe: `--dump-single-json --skip-download --no-playlist`
//! - fetch: `-x --audio-format <fmt> -o <scratch>/%(id)s.%(ext)s`

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::application::ports::{ExtractionError, ExtractorPort, FetchedAudio, ResolvedMedia};
use crate::domain::track::{ArtifactKey, AudioFormat, Provider, Query, SourceId, TrackMetadata};

/// yt-dlp 配置
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// 可执行文件路径
    pub binary: String,
    /// 搜索前缀，例如 `ytsearch1`
    pub search_prefix: String,
    /// 下载后转码的目标格式
    pub audio_format: AudioFormat,
    /// 单次调用超时
    pub timeout: Duration,
    /// 网络失败的最大重试次数
    pub max_retries: u32,
    /// 线性退避基数
    pub retry_backoff: Duration,
    /// 额外参数（代理、cookies 等）
    pub extra_args: Vec<String>,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            search_prefix: "ytsearch1".to_string(),
            audio_format: AudioFormat::Mp3,
            timeout: Duration::from_secs(300),
            max_retries: 2,
            retry_backoff: Duration::from_millis(1000),
            extra_args: Vec::new(),
        }
    }
}

/// yt-dlp JSON 输出中用到的字段
#[derive(Debug, Clone, Default, Deserialize)]
struct YtDlpInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    extractor_key: Option<String>,
    #[serde(default)]
    entries: Option<Vec<YtDlpInfo>>,
}

/// 将 yt-dlp stderr 归类为提取错误
pub(crate) fn classify_stderr(stderr: &str) -> ExtractionError {
    let lower = stderr.to_lowercase();
    let message = stderr
        .lines()
        .rev()
        .find(|l| l.contains("ERROR"))
        .unwrap_or_else(|| stderr.lines().last().unwrap_or(""))
        .trim()
        .to_string();

    if lower.contains("unsupported url") || lower.contains("no suitable extractor") {
        ExtractionError::Unsupported(message)
    } else if lower.contains("video unavailable")
        || lower.contains("not available")
        || lower.contains("private video")
        || lower.contains("has been removed")
        || lower.contains("http error 404")
        || lower.contains("does not exist")
    {
        ExtractionError::NotFound(message)
    } else if lower.contains("http error")
        || lower.contains("unable to download")
        || lower.contains("timed out")
        || lower.contains("connection")
        || lower.contains("network is unreachable")
        || lower.contains("temporary failure in name resolution")
    {
        ExtractionError::NetworkFailure(message)
    } else {
        ExtractionError::DecodeFailure(message)
    }
}

fn parse_info(stdout: &[u8]) -> Result<YtDlpInfo, ExtractionError> {
    let info: YtDlpInfo = serde_json::from_slice(stdout)
        .map_err(|e| ExtractionError::DecodeFailure(format!("invalid yt-dlp JSON: {}", e)))?;

    // 搜索结果是一个播放列表，取第一条
    match info.entries {
        Some(entries) => entries
            .into_iter()
            .next()
            .ok_or_else(|| ExtractionError::NotFound("no search results".to_string())),
        None => Ok(info),
    }
}

fn to_media(info: YtDlpInfo, query: &Query, fallback_target: String) -> Result<ResolvedMedia, ExtractionError> {
    let id = info
        .id
        .ok_or_else(|| ExtractionError::DecodeFailure("yt-dlp output without id".to_string()))?;

    let provider = match (&info.extractor_key, query) {
        (Some(key), _) => Provider::from_extractor_key(key),
        (None, Query::Link { provider, .. }) => *provider,
        (None, Query::Search { .. }) => Provider::YouTube,
    };
    let source_id = SourceId::new(id).map_err(|e| ExtractionError::DecodeFailure(e.to_string()))?;
    let key = ArtifactKey::new(provider, source_id);

    let artist = info
        .artist
        .or(info.creator)
        .or(info.uploader)
        .or(info.channel)
        .unwrap_or_else(|| "Unknown artist".to_string());
    let mut metadata = TrackMetadata::new(
        info.title.unwrap_or_else(|| "Unknown title".to_string()),
        artist,
    );
    metadata.duration_secs = info.duration.map(|d| d.round().max(0.0) as u32);
    metadata.thumbnail_url = info.thumbnail;
    metadata.webpage_url = info.webpage_url.clone();

    Ok(ResolvedMedia {
        key,
        metadata,
        fetch_target: info.webpage_url.unwrap_or(fallback_target),
    })
}

/// 在临时目录中找到唯一的输出文件
fn pick_output(scratch_dir: &Path, preferred: AudioFormat) -> Result<FetchedAudio, ExtractionError> {
    let entries = std::fs::read_dir(scratch_dir)
        .map_err(|e| ExtractionError::DecodeFailure(format!("scratch dir unreadable: {}", e)))?;

    let mut candidates: Vec<(PathBuf, AudioFormat)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let format = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(AudioFormat::from_extension)?;
            Some((path, format))
        })
        .collect();
    candidates.sort_by_key(|(_, format)| *format != preferred);

    candidates
        .into_iter()
        .next()
        .map(|(path, format)| FetchedAudio { path, format })
        .ok_or_else(|| ExtractionError::DecodeFailure("yt-dlp produced no audio file".to_string()))
}

/// yt-dlp 提取器
pub struct YtDlpExtractor {
    config: YtDlpConfig,
}

impl YtDlpExtractor {
    pub fn new(config: YtDlpConfig) -> Self {
        tracing::info!(
            binary = %config.binary,
            audio_format = %config.audio_format,
            timeout_secs = config.timeout.as_secs(),
            "YtDlpExtractor initialized"
        );
        Self { config }
    }

    async fn run_once(&self, args: &[String]) -> Result<Vec<u8>, ExtractionError> {
        let mut command = Command::new(&self.config.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            ExtractionError::DecodeFailure(format!("failed to start {}: {}", self.config.binary, e))
        })?;

        // 超时后 future 被丢弃，kill_on_drop 负责结束子进程
        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                ExtractionError::NetworkFailure(format!(
                    "yt-dlp timed out after {}s",
                    self.config.timeout.as_secs()
                ))
            })?
            .map_err(|e| ExtractionError::DecodeFailure(e.to_string()))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(status = %output.status, stderr = %stderr, "yt-dlp failed");
            Err(classify_stderr(&stderr))
        }
    }

    async fn run(&self, args: Vec<String>) -> Result<Vec<u8>, ExtractionError> {
        let mut attempt = 0u32;
        loop {
            match self.run_once(&args).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.config.retry_backoff * attempt;
                    tracing::warn!(
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "yt-dlp network failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                result => return result,
            }
        }
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["--no-playlist".to_string(), "--no-warnings".to_string()];
        args.extend(self.config.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl ExtractorPort for YtDlpExtractor {
    async fn probe(&self, query: &Query) -> Result<ResolvedMedia, ExtractionError> {
        let target = query.extractor_target(&self.config.search_prefix);

        let mut args = vec!["--dump-single-json".to_string(), "--skip-download".to_string()];
        args.extend(self.common_args());
        args.push(target.clone());

        let stdout = self.run(args).await?;
        let media = to_media(parse_info(&stdout)?, query, target)?;

        tracing::debug!(
            key = %media.key,
            title = %media.metadata.title,
            duration_secs = ?media.metadata.duration_secs,
            "yt-dlp probe complete"
        );
        Ok(media)
    }

    async fn fetch(
        &self,
        media: &ResolvedMedia,
        scratch_dir: &Path,
    ) -> Result<FetchedAudio, ExtractionError> {
        let template = scratch_dir.join("%(id)s.%(ext)s");

        let mut args = vec![
            "-x".to_string(),
            "--audio-format".to_string(),
            self.config.audio_format.extension().to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
        ];
        args.extend(self.common_args());
        args.push(media.fetch_target.clone());

        self.run(args).await?;
        pick_output(scratch_dir, self.config.audio_format)
    }

    async fn health_check(&self) -> bool {
        Command::new(&self.config.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_classify_stderr() {
        assert!(matches!(
            classify_stderr("ERROR: Unsupported URL: https://example.com"),
            ExtractionError::Unsupported(_)
        ));
        assert!(matches!(
            classify_stderr("ERROR: [youtube] abc: Video unavailable"),
            ExtractionError::NotFound(_)
        ));
        assert!(matches!(
            classify_stderr("ERROR: unable to download webpage: HTTP Error 503"),
            ExtractionError::NetworkFailure(_)
        ));
        assert!(matches!(
            classify_stderr("ERROR: Postprocessing: ffprobe and ffmpeg not found"),
            ExtractionError::DecodeFailure(_)
        ));
    }

    #[test]
    fn test_parse_search_result_takes_first_entry() {
        let json = br#"{
            "_type": "playlist",
            "id": "never gonna",
            "entries": [
                {"id": "dQw4w9WgXcQ", "title": "Never Gonna Give You Up", "uploader": "Rick Astley",
                 "duration": 212.0, "extractor_key": "Youtube",
                 "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"}
            ]
        }"#;
        let query = Query::parse("never gonna").unwrap();
        let media = to_media(parse_info(json).unwrap(), &query, "x".to_string()).unwrap();

        assert_eq!(media.key.provider, Provider::YouTube);
        assert_eq!(media.key.source_id.as_str(), "dQw4w9WgXcQ");
        assert_eq!(media.metadata.artist, "Rick Astley");
        assert_eq!(media.metadata.duration_secs, Some(212));
        assert_eq!(media.fetch_target, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_empty_search_is_not_found() {
        let json = br#"{"_type": "playlist", "id": "zzz", "entries": []}"#;
        assert!(matches!(parse_info(json), Err(ExtractionError::NotFound(_))));
    }

    #[test]
    fn test_invalid_json_is_decode_failure() {
        assert!(matches!(parse_info(b"not json"), Err(ExtractionError::DecodeFailure(_))));
    }

    #[test]
    fn test_pick_output_prefers_configured_format() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("abc.webm.part"), b"x").unwrap();
        std::fs::write(dir.path().join("abc.m4a"), b"x").unwrap();
        std::fs::write(dir.path().join("abc.mp3"), b"x").unwrap();

        let fetched = pick_output(dir.path(), AudioFormat::Mp3).unwrap();
        assert_eq!(fetched.format, AudioFormat::Mp3);

        let empty = tempdir().unwrap();
        assert!(pick_output(empty.path(), AudioFormat::Mp3).is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_fails_without_retry() {
        let extractor = YtDlpExtractor::new(YtDlpConfig {
            binary: "/nonexistent/yt-dlp-binary".to_string(),
            ..Default::default()
        });
        let query = Query::parse("anything").unwrap();
        assert!(matches!(
            extractor.probe(&query).await,
            Err(ExtractionError::DecodeFailure(_))
        ));
        assert!(!extractor.health_check().await);
    }
}
