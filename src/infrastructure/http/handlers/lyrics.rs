//! Lyrics Handler

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::GetLyrics;
use crate::infrastructure::http::dto::{ApiResponse, LyricsDto, LyricsRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 查询歌词
pub async fn get_lyrics(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LyricsRequest>,
) -> Result<Json<ApiResponse<LyricsDto>>, ApiError> {
    let handler = state
        .get_lyrics_handler
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("lyrics lookup is disabled".to_string()))?;

    let result = handler
        .handle(GetLyrics {
            title: req.title,
            artist: req.artist,
        })
        .await?;

    Ok(Json(ApiResponse::success(LyricsDto::from(result))))
}
