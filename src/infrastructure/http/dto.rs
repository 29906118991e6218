//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::application::{LyricsResponse, RequesterResponse, StatsResponse};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    pub fn ok() -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(Empty {}),
        }
    }
}

// ============================================================================
// Pipeline DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub requester_id: String,
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct FullRequest {
    pub handle: String,
}

/// 预览响应头
pub mod headers {
    pub const RETENTION_HANDLE: &str = "x-retention-handle";
    pub const TRACK_TITLE: &str = "x-track-title";
    pub const TRACK_ARTIST: &str = "x-track-artist";
    pub const TRACK_DURATION_SECS: &str = "x-track-duration-secs";
    pub const PREVIEW_DURATION_MS: &str = "x-preview-duration-ms";
    pub const HANDLE_EXPIRES_AT: &str = "x-handle-expires-at";
}

// ============================================================================
// Lyrics DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LyricsRequest {
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Serialize)]
pub struct LyricsDto {
    pub title: String,
    pub artist: String,
    pub found: bool,
    pub lyrics: Option<String>,
}

impl From<LyricsResponse> for LyricsDto {
    fn from(r: LyricsResponse) -> Self {
        Self {
            found: r.lyrics.is_some(),
            title: r.title,
            artist: r.artist,
            lyrics: r.lyrics,
        }
    }
}

// ============================================================================
// Requester DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct RequesterDto {
    pub requester_id: String,
    pub search_count: u64,
    pub language: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<RequesterResponse> for RequesterDto {
    fn from(r: RequesterResponse) -> Self {
        Self {
            requester_id: r.requester_id,
            search_count: r.search_count,
            language: r.language,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// ============================================================================
// Stats DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatsDto {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub live_handles: usize,
    pub pinned_artifacts: usize,
    pub tombstones: usize,
    pub downloads_in_flight: usize,
}

impl From<StatsResponse> for StatsDto {
    fn from(r: StatsResponse) -> Self {
        Self {
            total_entries: r.store.total_entries,
            total_size_bytes: r.store.total_size_bytes,
            hit_count: r.store.hit_count,
            miss_count: r.store.miss_count,
            live_handles: r.lifecycle.live_handles,
            pinned_artifacts: r.lifecycle.pinned_artifacts,
            tombstones: r.lifecycle.tombstones,
            downloads_in_flight: r.downloads_in_flight,
        }
    }
}
