//! Lyrics Queries

/// 查询歌词
#[derive(Debug, Clone)]
pub struct GetLyrics {
    pub title: String,
    pub artist: String,
}
