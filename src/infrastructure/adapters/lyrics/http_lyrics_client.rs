//! HTTP Lyrics Client - 调用 lyrics.ovh 兼容的歌词服务
//!
//! GET {base_url}/v1/{artist}/{title}
//! Response: {"lyrics": "..."}，未找到时返回 404

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::application::ports::{LyricsError, LyricsPort};

#[derive(Debug, Deserialize)]
struct LyricsHttpResponse {
    #[serde(default)]
    lyrics: Option<String>,
}

/// HTTP 歌词客户端配置
#[derive(Debug, Clone)]
pub struct HttpLyricsClientConfig {
    /// 服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpLyricsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.lyrics.ovh".to_string(),
            timeout_secs: 10,
        }
    }
}

/// HTTP 歌词客户端
pub struct HttpLyricsClient {
    client: Client,
    base_url: Url,
}

impl HttpLyricsClient {
    pub fn new(config: HttpLyricsClientConfig) -> Result<Self, LyricsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LyricsError::NetworkError(e.to_string()))?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| LyricsError::ServiceError(format!("invalid base url: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// 构造查询 URL，歌手与歌名按路径段编码
    fn lookup_url(&self, title: &str, artist: &str) -> Result<Url, LyricsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LyricsError::ServiceError("base url cannot have a path".to_string()))?
            .pop_if_empty()
            .push("v1")
            .push(artist)
            .push(title);
        Ok(url)
    }
}

#[async_trait]
impl LyricsPort for HttpLyricsClient {
    async fn lookup(&self, title: &str, artist: &str) -> Result<Option<String>, LyricsError> {
        let url = self.lookup_url(title, artist)?;
        tracing::debug!(url = %url, "Sending lyrics request");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                LyricsError::Timeout
            } else {
                LyricsError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LyricsError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body: LyricsHttpResponse = response
            .json()
            .await
            .map_err(|e| LyricsError::InvalidResponse(e.to_string()))?;

        Ok(body
            .lyrics
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::{Json, Router};

    async fn serve_fake() -> String {
        async fn handler(
            Path((artist, title)): Path<(String, String)>,
        ) -> Result<Json<serde_json::Value>, AxumStatus> {
            if artist == "AC/DC" && title == "Thunder Struck" {
                Ok(Json(serde_json::json!({ "lyrics": "Thunder!\n" })))
            } else {
                Err(AxumStatus::NOT_FOUND)
            }
        }

        let app = Router::new().route("/v1/:artist/:title", get(handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_lookup_url_escapes_segments() {
        let client = HttpLyricsClient::new(HttpLyricsClientConfig {
            base_url: "https://api.lyrics.ovh/".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        let url = client.lookup_url("Back in Black", "AC/DC").unwrap();
        assert_eq!(url.as_str(), "https://api.lyrics.ovh/v1/AC%2FDC/Back%20in%20Black");
    }

    #[tokio::test]
    async fn test_lookup_found_and_missing() {
        let base_url = serve_fake().await;
        let client = HttpLyricsClient::new(HttpLyricsClientConfig {
            base_url,
            timeout_secs: 5,
        })
        .unwrap();

        let found = client.lookup("Thunder Struck", "AC/DC").await.unwrap();
        assert_eq!(found.as_deref(), Some("Thunder!"));

        let missing = client.lookup("Nothing", "Nobody").await.unwrap();
        assert!(missing.is_none());
    }
}
