//! Fake Extractor - 用于测试的提取器
//!
//! 不访问网络，按查询返回确定性的元数据，fetch 时写出锯齿波 WAV 或静音 MP3

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::application::ports::{ExtractionError, ExtractorPort, FetchedAudio, ResolvedMedia};
use crate::domain::track::{ArtifactKey, AudioFormat, Provider, Query, SourceId, TrackMetadata};
use crate::infrastructure::adapters::preview::mp3::silent_mp3;
use crate::infrastructure::adapters::preview::wav::sawtooth_wav;

/// 未显式登记的曲目时长
const DEFAULT_DURATION_MS: u64 = 45_000;

#[derive(Debug, Clone)]
struct FakeTrack {
    id: String,
    title: String,
    duration_ms: u64,
}

/// Fake Extractor
///
/// 相同查询总是解析到相同 ID；fetch/probe 次数可被断言
pub struct FakeExtractor {
    /// 搜索词 -> 曲目
    searches: DashMap<String, FakeTrack>,
    /// ID -> 时长
    durations: DashMap<String, u64>,
    probe_failures: DashMap<String, ExtractionError>,
    fetch_failures: DashMap<String, ExtractionError>,
    delay: Duration,
    sample_rate: u32,
    format: AudioFormat,
    probe_count: AtomicUsize,
    fetch_count: AtomicUsize,
}

impl Default for FakeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            searches: DashMap::new(),
            durations: DashMap::new(),
            probe_failures: DashMap::new(),
            fetch_failures: DashMap::new(),
            delay: Duration::ZERO,
            sample_rate: 8000,
            format: AudioFormat::Wav,
            probe_count: AtomicUsize::new(0),
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// 模拟下载耗时
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// 输出格式，仅支持 WAV 与 MP3，其余按 WAV 处理
    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    /// 登记一个搜索词对应的曲目
    pub fn with_track(self, query: &str, id: &str, duration: Duration) -> Self {
        self.searches.insert(
            query.trim().to_lowercase(),
            FakeTrack {
                id: id.to_string(),
                title: query.trim().to_string(),
                duration_ms: duration.as_millis() as u64,
            },
        );
        self.durations
            .insert(id.to_string(), duration.as_millis() as u64);
        self
    }

    /// 设置 ID 对应的曲目时长（用于链接查询）
    pub fn with_duration(self, id: &str, duration: Duration) -> Self {
        self.durations
            .insert(id.to_string(), duration.as_millis() as u64);
        self
    }

    /// 让某个查询在 probe 阶段失败
    pub fn with_probe_failure(self, query: &str, error: ExtractionError) -> Self {
        self.probe_failures
            .insert(query.trim().to_lowercase(), error);
        self
    }

    /// 让某个 ID 在 fetch 阶段失败
    pub fn with_fetch_failure(self, id: &str, error: ExtractionError) -> Self {
        self.fetch_failures.insert(id.to_string(), error);
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probe_count.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    fn derived_id(text: &str) -> String {
        format!("{:x}", md5::compute(text.as_bytes()))[..11].to_string()
    }

    fn resolve_track(&self, query: &Query) -> (Provider, FakeTrack) {
        match query {
            Query::Search { text } => {
                let normalized = text.trim().to_lowercase();
                let track = self
                    .searches
                    .get(&normalized)
                    .map(|t| t.clone())
                    .unwrap_or_else(|| FakeTrack {
                        id: Self::derived_id(&normalized),
                        title: text.trim().to_string(),
                        duration_ms: DEFAULT_DURATION_MS,
                    });
                (Provider::YouTube, track)
            }
            Query::Link {
                url,
                provider,
                source_id,
            } => {
                let id = source_id
                    .as_ref()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(|| Self::derived_id(url));
                (
                    *provider,
                    FakeTrack {
                        title: format!("Track {}", id),
                        duration_ms: self
                            .durations
                            .get(&id)
                            .map(|d| *d)
                            .unwrap_or(DEFAULT_DURATION_MS),
                        id,
                    },
                )
            }
        }
    }
}

#[async_trait]
impl ExtractorPort for FakeExtractor {
    async fn probe(&self, query: &Query) -> Result<ResolvedMedia, ExtractionError> {
        self.probe_count.fetch_add(1, Ordering::SeqCst);

        let lookup = match query {
            Query::Search { text } => text.trim().to_lowercase(),
            Query::Link { url, .. } => url.trim().to_lowercase(),
        };
        if let Some(error) = self.probe_failures.get(&lookup) {
            return Err(error.clone());
        }

        let (provider, track) = self.resolve_track(query);
        let source_id =
            SourceId::new(track.id.clone()).map_err(|e| ExtractionError::DecodeFailure(e.to_string()))?;
        let metadata = TrackMetadata::new(track.title.clone(), "Fake Artist")
            .with_duration((track.duration_ms / 1000) as u32);

        Ok(ResolvedMedia {
            key: ArtifactKey::new(provider, source_id),
            metadata,
            fetch_target: query.extractor_target("fakesearch"),
        })
    }

    async fn fetch(
        &self,
        media: &ResolvedMedia,
        scratch_dir: &Path,
    ) -> Result<FetchedAudio, ExtractionError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let id = media.key.source_id.as_str();
        if let Some(error) = self.fetch_failures.get(id) {
            return Err(error.clone());
        }

        let duration_ms = self
            .durations
            .get(id)
            .map(|d| *d)
            .or_else(|| media.metadata.duration_secs.map(|s| s as u64 * 1000))
            .unwrap_or(DEFAULT_DURATION_MS);
        let seed = id.bytes().map(u64::from).sum::<u64>();
        let (audio, format) = match self.format {
            AudioFormat::Mp3 => (silent_mp3(duration_ms), AudioFormat::Mp3),
            _ => (sawtooth_wav(duration_ms, self.sample_rate, 1, seed), AudioFormat::Wav),
        };

        let path = scratch_dir.join(format!("{}.{}", id, format.extension()));
        tokio::fs::write(&path, &audio)
            .await
            .map_err(|e| ExtractionError::DecodeFailure(e.to_string()))?;

        tracing::debug!(
            id = %id,
            duration_ms = duration_ms,
            path = %path.display(),
            "FakeExtractor: wrote audio"
        );

        Ok(FetchedAudio { path, format })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_same_query_same_key() {
        let extractor = FakeExtractor::new();
        let a = extractor.probe(&Query::parse("some song").unwrap()).await.unwrap();
        let b = extractor.probe(&Query::parse("  Some Song ").unwrap()).await.unwrap();
        assert_eq!(a.key, b.key);
        assert_eq!(extractor.probe_count(), 2);
    }

    #[tokio::test]
    async fn test_registered_track_and_link_converge() {
        let extractor = FakeExtractor::new().with_track("hit", "dQw4w9WgXcQ", Duration::from_secs(10));
        let search = extractor.probe(&Query::parse("hit").unwrap()).await.unwrap();
        let link = extractor
            .probe(&Query::parse("https://youtu.be/dQw4w9WgXcQ").unwrap())
            .await
            .unwrap();
        assert_eq!(search.key, link.key);
        assert_eq!(search.metadata.duration_secs, Some(10));
    }

    #[tokio::test]
    async fn test_fetch_writes_wav_and_counts() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new().with_track("hit", "abc", Duration::from_secs(2));
        let media = extractor.probe(&Query::parse("hit").unwrap()).await.unwrap();

        let fetched = extractor.fetch(&media, dir.path()).await.unwrap();
        assert_eq!(fetched.format, AudioFormat::Wav);
        let bytes = std::fs::read(&fetched.path).unwrap();
        assert_eq!(bytes.len(), 44 + 2 * 8000 * 2);
        assert_eq!(extractor.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_writes_mp3_when_configured() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new()
            .with_format(AudioFormat::Mp3)
            .with_track("hit", "abc", Duration::from_secs(2));
        let media = extractor.probe(&Query::parse("hit").unwrap()).await.unwrap();

        let fetched = extractor.fetch(&media, dir.path()).await.unwrap();
        assert_eq!(fetched.format, AudioFormat::Mp3);
        assert_eq!(fetched.path.extension().unwrap(), "mp3");
        let bytes = std::fs::read(&fetched.path).unwrap();
        assert_eq!(bytes, silent_mp3(2000));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new()
            .with_probe_failure("missing", ExtractionError::NotFound("nope".into()))
            .with_track("broken", "brk", Duration::from_secs(1))
            .with_fetch_failure("brk", ExtractionError::DecodeFailure("bad".into()));

        assert!(matches!(
            extractor.probe(&Query::parse("missing").unwrap()).await,
            Err(ExtractionError::NotFound(_))
        ));

        let media = extractor.probe(&Query::parse("broken").unwrap()).await.unwrap();
        assert!(matches!(
            extractor.fetch(&media, dir.path()).await,
            Err(ExtractionError::DecodeFailure(_))
        ));
    }
}
