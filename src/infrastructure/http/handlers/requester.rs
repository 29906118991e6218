//! Requester Handlers - 请求者统计与语言偏好

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::application::GetRequester;
use crate::infrastructure::http::dto::{ApiResponse, Empty, LanguageRequest, RequesterDto};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

fn disabled() -> ApiError {
    ApiError::ServiceUnavailable("requester statistics are disabled".to_string())
}

/// 获取请求者统计
pub async fn get_requester(
    State(state): State<Arc<AppState>>,
    Path(requester_id): Path<String>,
) -> Result<Json<ApiResponse<RequesterDto>>, ApiError> {
    let handler = state.get_requester_handler.as_ref().ok_or_else(disabled)?;
    let result = handler.handle(GetRequester { requester_id }).await?;
    Ok(Json(ApiResponse::success(RequesterDto::from(result))))
}

/// 设置语言偏好
pub async fn set_language(
    State(state): State<Arc<AppState>>,
    Path(requester_id): Path<String>,
    Json(req): Json<LanguageRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let handler = state.set_language_handler.as_ref().ok_or_else(disabled)?;
    handler.handle(&requester_id, &req.language).await?;
    Ok(Json(ApiResponse::ok()))
}
