//! HTTP Middleware
//!
//! HTTP 状态码错误日志中间件

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// 超过该耗时的成功请求记一条 info（下载类请求通常较慢）
const SLOW_REQUEST_MS: u128 = 10_000;

/// HTTP 状态码错误日志中间件
///
/// 拦截 HTTP 响应，当状态码为 4xx 或 5xx 时记录日志
/// 注意：业务错误（errno != 0）在 ApiError::into_response() 中记录
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis();

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            elapsed_ms = elapsed_ms as u64,
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            elapsed_ms = elapsed_ms as u64,
            "HTTP client error"
        );
    } else if elapsed_ms >= SLOW_REQUEST_MS {
        tracing::info!(
            method = %method,
            uri = %uri,
            elapsed_ms = elapsed_ms as u64,
            "Slow HTTP request"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        routing::{get, post},
        Router,
    };
    use tower::util::ServiceExt;

    async fn ping_handler() -> &'static str {
        "ok"
    }

    async fn unsupported_media() -> StatusCode {
        StatusCode::UNSUPPORTED_MEDIA_TYPE
    }

    async fn broken() -> StatusCode {
        StatusCode::BAD_GATEWAY
    }

    fn create_test_router() -> Router {
        Router::new()
            .route("/api/ping", get(ping_handler))
            .route("/api/query", post(unsupported_media))
            .route("/api/full", post(broken))
            .layer(axum::middleware::from_fn(error_logging_middleware))
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        create_test_router().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_passes_through_success() {
        assert_eq!(status_of("GET", "/api/ping").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_passes_through_client_error() {
        assert_eq!(
            status_of("POST", "/api/query").await,
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(status_of("GET", "/api/missing").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_passes_through_server_error() {
        assert_eq!(status_of("POST", "/api/full").await, StatusCode::BAD_GATEWAY);
    }
}
