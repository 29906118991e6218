//! Track Context - Value Objects

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::TrackError;

/// 查询最大长度（字符）
pub const MAX_QUERY_LEN: usize = 500;

static YOUTUBE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|shorts/|embed/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .expect("valid youtube id pattern")
});

/// 媒体来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    YouTube,
    SoundCloud,
    Generic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::YouTube => "youtube",
            Provider::SoundCloud => "soundcloud",
            Provider::Generic => "generic",
        }
    }

    /// 根据 yt-dlp 的 `extractor_key` 推断来源
    pub fn from_extractor_key(key: &str) -> Self {
        let key = key.to_ascii_lowercase();
        if key.starts_with("youtube") {
            Provider::YouTube
        } else if key.starts_with("soundcloud") {
            Provider::SoundCloud
        } else {
            Provider::Generic
        }
    }

    /// 根据链接推断来源
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_ascii_lowercase();
        if lower.contains("youtube.com/") || lower.contains("youtu.be/") {
            Provider::YouTube
        } else if lower.contains("soundcloud.com/") {
            Provider::SoundCloud
        } else {
            Provider::Generic
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "youtube" => Ok(Provider::YouTube),
            "soundcloud" => Ok(Provider::SoundCloud),
            "generic" => Ok(Provider::Generic),
            other => Err(TrackError::UnknownProvider(other.to_string())),
        }
    }
}

/// 来源内的稳定媒体标识（yt-dlp 的 `id`）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Result<Self, TrackError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TrackError::InvalidSourceId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 制品键：(provider, source id)
///
/// 不变量:
/// - 同一个键在内容存储中最多对应一个完整制品
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub provider: Provider,
    pub source_id: SourceId,
}

impl ArtifactKey {
    pub fn new(provider: Provider, source_id: SourceId) -> Self {
        Self {
            provider,
            source_id,
        }
    }

    /// 内容地址：md5("{provider}:{id}")
    pub fn fingerprint(&self) -> String {
        let digest = md5::compute(format!("{}:{}", self.provider, self.source_id).as_bytes());
        format!("{:x}", digest)
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.source_id)
    }
}

/// 用户查询：直链或搜索词
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Link {
        url: String,
        provider: Provider,
        /// 可离线识别的媒体 ID（目前仅 YouTube）
        source_id: Option<SourceId>,
    },
    Search {
        text: String,
    },
}

impl Query {
    pub fn parse(raw: &str) -> Result<Self, TrackError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TrackError::EmptyQuery);
        }
        let len = raw.chars().count();
        if len > MAX_QUERY_LEN {
            return Err(TrackError::QueryTooLong {
                len,
                max: MAX_QUERY_LEN,
            });
        }

        let lower = raw.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Ok(Query::Search {
                text: raw.to_string(),
            });
        }

        let provider = Provider::from_url(raw);
        let source_id = match provider {
            Provider::YouTube => YOUTUBE_ID_RE
                .captures(raw)
                .and_then(|c| c.get(1))
                .and_then(|m| SourceId::new(m.as_str()).ok()),
            _ => None,
        };

        Ok(Query::Link {
            url: raw.to_string(),
            provider,
            source_id,
        })
    }

    /// 离线可确定的制品键（不需要网络）
    pub fn known_key(&self) -> Option<ArtifactKey> {
        match self {
            Query::Link {
                provider,
                source_id: Some(id),
                ..
            } => Some(ArtifactKey::new(*provider, id.clone())),
            _ => None,
        }
    }

    /// 交给提取器的目标字符串
    ///
    /// YouTube 链接的各种别名统一规范化为 watch URL
    pub fn extractor_target(&self, search_prefix: &str) -> String {
        match self {
            Query::Link {
                provider: Provider::YouTube,
                source_id: Some(id),
                ..
            } => format!("https://www.youtube.com/watch?v={}", id),
            Query::Link { url, .. } => url.clone(),
            Query::Search { text } => format!("{}:{}", search_prefix, text),
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Query::Link { .. })
    }
}

/// 曲目元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    /// 时长（秒），可能未知
    pub duration_secs: Option<u32>,
    pub thumbnail_url: Option<String>,
    pub webpage_url: Option<String>,
}

impl TrackMetadata {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            duration_secs: None,
            thumbnail_url: None,
            webpage_url: None,
        }
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs).filter(|s| *s > 0);
        self
    }

    /// "artist - title"，用于日志展示
    pub fn display_name(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }
}

/// 音频格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    M4a,
    Ogg,
    Flac,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Some(Self::Wav),
            "mp3" => Some(Self::Mp3),
            "m4a" | "aac" | "mp4" => Some(Self::M4a),
            "ogg" | "oga" => Some(Self::Ogg),
            "flac" => Some(Self::Flac),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::M4a => "audio/mp4",
            Self::Ogg => "audio/ogg",
            Self::Flac => "audio/flac",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| TrackError::UnsupportedFormat(s.to_string()))
    }
}
