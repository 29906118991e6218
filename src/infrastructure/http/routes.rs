//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                        GET   健康检查
//! - /api/query                       POST  提交查询，返回预览音频
//! - /api/full                        POST  凭保留句柄获取完整音频（流式）
//! - /api/lyrics                      POST  歌词查询
//! - /api/requester/:id               GET   请求者统计
//! - /api/requester/:id/language      POST  设置语言偏好
//! - /api/stats                       GET   存储与生命周期统计

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/api", api_routes())
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/query", post(handlers::submit_query))
        .route("/full", post(handlers::request_full))
        .route("/lyrics", post(handlers::get_lyrics))
        .nest("/requester", requester_routes())
        .route("/stats", get(handlers::get_stats))
}

/// Requester 路由
fn requester_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:requester_id", get(handlers::get_requester))
        .route("/:requester_id/language", post(handlers::set_language))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::PipelineSettings;
    use crate::infrastructure::adapters::{
        FakeExtractor, FileContentStore, SymphoniaPreviewSynthesizer,
    };
    use crate::infrastructure::http::dto::headers;
    use crate::infrastructure::http::server::build_router;
    use crate::infrastructure::memory::{InMemoryLifecycleManager, LifecycleConfig};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    async fn test_router(dir: &std::path::Path) -> Router {
        let store = FileContentStore::open(dir.join("store")).await.unwrap().arc();
        let lifecycle =
            Arc::new(InMemoryLifecycleManager::new(store.clone(), LifecycleConfig::default()));
        let settings = PipelineSettings {
            scratch_dir: dir.join("scratch"),
            ..PipelineSettings::default()
        };
        let state = AppState::new(
            Arc::new(FakeExtractor::new()),
            store,
            Arc::new(SymphoniaPreviewSynthesizer::new()),
            lifecycle,
            None,
            None,
            settings,
        );
        build_router(Arc::new(state))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path()).await;
        let request = Request::builder().uri("/api/ping").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_query_then_full_consumes_handle() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path()).await;

        let response = app
            .clone()
            .oneshot(post_json("/api/query", json!({"requester_id": "42", "query": "daft punk"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "audio/wav");
        let handle = response.headers()[headers::RETENTION_HANDLE]
            .to_str()
            .unwrap()
            .to_string();
        let preview_ms: u64 = response.headers()[headers::PREVIEW_DURATION_MS]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(preview_ms, 30_000);
        let preview = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&preview[..4], b"RIFF");

        let full = app
            .clone()
            .oneshot(post_json("/api/full", json!({ "handle": handle })))
            .await
            .unwrap();
        assert_eq!(full.status(), StatusCode::OK);
        let bytes = to_bytes(full.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.len() > preview.len());

        let again = app
            .oneshot(post_json("/api/full", json!({ "handle": handle })))
            .await
            .unwrap();
        let body = json_body(again).await;
        assert_eq!(body["errno"], 404);
    }

    #[tokio::test]
    async fn test_query_rejects_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path()).await;
        let response = app
            .oneshot(post_json("/api/query", json!({"requester_id": "42", "query": "   "})))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["errno"], 400);
    }

    #[tokio::test]
    async fn test_optional_features_report_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path()).await;
        let response = app
            .clone()
            .oneshot(post_json("/api/lyrics", json!({"title": "a", "artist": "b"})))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["errno"], 503);

        let request = Request::builder()
            .uri("/api/requester/42")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(json_body(response).await["errno"], 503);
    }

    #[tokio::test]
    async fn test_stats() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path()).await;
        let request = Request::builder().uri("/api/stats").body(Body::empty()).unwrap();
        let body = json_body(app.oneshot(request).await.unwrap()).await;
        assert_eq!(body["errno"], 0);
        assert_eq!(body["data"]["total_entries"], 0);
        assert_eq!(body["data"]["live_handles"], 0);
    }
}
