//! Lyrics Adapters

mod http_lyrics_client;

pub use http_lyrics_client::{HttpLyricsClient, HttpLyricsClientConfig};
