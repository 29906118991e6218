//! Query Handler - 提交查询并返回预览音频

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::header_value;
use crate::application::{PipelineEvent, PreviewReady, SubmitQueryCommand};
use crate::infrastructure::http::dto::{headers, QueryRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 提交查询
///
/// 成功时响应体为预览音频，元数据放在 `X-*` 响应头中；
/// 客户端断开会丢弃订阅，流水线随之取消并撤销已签发的句柄
pub async fn submit_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    let requester_id = req.requester_id.trim().to_string();
    if requester_id.is_empty() {
        return Err(ApiError::BadRequest("requester_id is required".to_string()));
    }

    let subscription = state
        .submit_query_handler
        .handle(SubmitQueryCommand::new(requester_id.clone(), req.query));

    let events = subscription.collect().await;
    tracing::debug!(
        requester_id = %requester_id,
        events = ?events.iter().map(PipelineEvent::name).collect::<Vec<_>>(),
        "Pipeline finished"
    );

    match events.into_iter().last() {
        Some(PipelineEvent::PreviewReady(ready)) => Ok(preview_response(ready)),
        Some(PipelineEvent::Failed { reason, kind }) => Err(failed_to_api(reason, kind)),
        _ => Err(ApiError::Internal("pipeline ended without a result".to_string())),
    }
}

fn failed_to_api(reason: String, kind: &'static str) -> ApiError {
    match kind {
        "validation" => ApiError::BadRequest(reason),
        "cancelled" => ApiError::ServiceUnavailable(reason),
        "internal" | "invalid_state" | "storage" | "repository" => ApiError::Internal(reason),
        _ => ApiError::FetchFailed { reason, kind },
    }
}

fn preview_response(ready: PreviewReady) -> Response {
    let mut map = HeaderMap::new();
    map.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(ready.preview.format.mime_type()),
    );
    map.insert(header::CONTENT_LENGTH, HeaderValue::from(ready.preview.audio_data.len()));
    map.insert(headers::RETENTION_HANDLE, header_value(&ready.handle.to_string()));
    map.insert(headers::TRACK_TITLE, header_value(&ready.metadata.title));
    map.insert(headers::TRACK_ARTIST, header_value(&ready.metadata.artist));
    if let Some(secs) = ready.metadata.duration_secs {
        map.insert(headers::TRACK_DURATION_SECS, HeaderValue::from(secs));
    }
    map.insert(
        headers::PREVIEW_DURATION_MS,
        HeaderValue::from(ready.preview.duration_ms),
    );
    map.insert(
        headers::HANDLE_EXPIRES_AT,
        header_value(&ready.expires_at.to_rfc3339()),
    );

    (map, ready.preview.audio_data).into_response()
}
