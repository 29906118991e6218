//! Full Delivery Handler - 凭句柄流式返回完整音频

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::header_value;
use crate::application::RequestFullCommand;
use crate::infrastructure::http::dto::{headers, FullRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 获取完整音频
///
/// 句柄在此处被消费；流读完或连接断开后制品引用随交付对象释放
pub async fn request_full(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FullRequest>,
) -> Result<Response, ApiError> {
    let delivery = state
        .request_full_handler
        .handle(RequestFullCommand::new(req.handle))
        .await?;

    let artifact = delivery.artifact();
    let format = artifact.format;
    let file_name = format!(
        "{}.{}",
        download_stem(&artifact.metadata.title, &artifact.key.fingerprint()),
        format.extension()
    );

    let mut map = HeaderMap::new();
    map.insert(header::CONTENT_TYPE, HeaderValue::from_static(format.mime_type()));
    map.insert(header::CONTENT_LENGTH, HeaderValue::from(delivery.size_bytes()));
    map.insert(
        header::CONTENT_DISPOSITION,
        header_value(&format!("attachment; filename=\"{}\"", file_name)),
    );
    map.insert(headers::TRACK_TITLE, header_value(&artifact.metadata.title));
    map.insert(headers::TRACK_ARTIST, header_value(&artifact.metadata.artist));

    tracing::info!(
        handle = %delivery.handle(),
        requester_id = %delivery.requester_id(),
        size_bytes = delivery.size_bytes(),
        "Streaming full artifact"
    );

    // 流式返回文件内容
    let body = Body::from_stream(ReaderStream::new(delivery));
    Ok((map, body).into_response())
}

/// 下载文件名只保留 ASCII 字母数字，其余替换为下划线
fn download_stem(title: &str, fallback: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        fallback.to_string()
    } else {
        stem.chars().take(80).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_stem() {
        assert_eq!(download_stem("Never Gonna Give You Up", "x"), "Never_Gonna_Give_You_Up");
        assert_eq!(download_stem("夜に駆ける", "abc123"), "abc123");
    }
}
