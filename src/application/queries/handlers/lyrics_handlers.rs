//! Lyrics Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::LyricsPort;
use crate::application::queries::GetLyrics;

/// 歌词响应
#[derive(Debug, Clone)]
pub struct LyricsResponse {
    pub title: String,
    pub artist: String,
    pub lyrics: Option<String>,
}

/// GetLyrics Handler
pub struct GetLyricsHandler {
    lyrics: Arc<dyn LyricsPort>,
}

impl GetLyricsHandler {
    pub fn new(lyrics: Arc<dyn LyricsPort>) -> Self {
        Self { lyrics }
    }

    pub async fn handle(&self, query: GetLyrics) -> Result<LyricsResponse, ApplicationError> {
        let title = query.title.trim();
        let artist = query.artist.trim();
        if title.is_empty() || artist.is_empty() {
            return Err(ApplicationError::validation("title and artist are required"));
        }

        let lyrics = self.lyrics.lookup(title, artist).await?;
        tracing::debug!(title = %title, artist = %artist, found = lyrics.is_some(), "Lyrics lookup");

        Ok(LyricsResponse {
            title: title.to_string(),
            artist: artist.to_string(),
            lyrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::LyricsError;
    use async_trait::async_trait;

    struct StaticLyrics;

    #[async_trait]
    impl LyricsPort for StaticLyrics {
        async fn lookup(&self, title: &str, _artist: &str) -> Result<Option<String>, LyricsError> {
            if title == "known" {
                Ok(Some("la la la".to_string()))
            } else {
                Ok(None)
            }
        }
    }

    #[tokio::test]
    async fn test_lookup_trims_and_returns_lyrics() {
        let handler = GetLyricsHandler::new(Arc::new(StaticLyrics));
        let response = handler
            .handle(GetLyrics {
                title: "  known ".to_string(),
                artist: "someone".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.title, "known");
        assert_eq!(response.lyrics.as_deref(), Some("la la la"));
    }

    #[tokio::test]
    async fn test_missing_artist_is_validation_error() {
        let handler = GetLyricsHandler::new(Arc::new(StaticLyrics));
        let err = handler
            .handle(GetLyrics {
                title: "known".to_string(),
                artist: " ".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::ValidationError(_)));
    }
}
