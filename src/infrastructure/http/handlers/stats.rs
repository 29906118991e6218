//! Stats Handler

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::GetStats;
use crate::infrastructure::http::dto::{ApiResponse, StatsDto};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 存储与生命周期统计
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StatsDto>>, ApiError> {
    let stats = state.get_stats_handler.handle(GetStats).await?;
    Ok(Json(ApiResponse::success(StatsDto::from(stats))))
}
