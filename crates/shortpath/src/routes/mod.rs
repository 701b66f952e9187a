//! HTTP route handlers for Shortpath.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use shortpath_common::ErrorResponse;
use std::time::Duration;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::state::AppState;

mod challenge;
mod health;
mod links;
mod nodes;

/// Headroom on top of the URL check for the rest of a link submission
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let request_timeout = state.config.url_check_timeout() + REQUEST_TIMEOUT_SLACK;
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .nest("/api", api_routes())
        .nest_service("/static", static_files)
        // Everything else is a shortcut to resolve
        .fallback(links::redirect)
        .layer(timeout_layer(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Requests still running after `timeout` get a 408
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // Link submission
        .route("/challenge", get(challenge::get_challenge))
        .route("/link", post(links::create_link))

        // Tree introspection
        .route("/node/root", get(nodes::get_root_nodes))
        .route("/node/{id}", get(nodes::get_node))
        .route("/node/{id}/children", get(nodes::get_node_children))
}

/// Error reply with a `{"error": ..}` body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::state::AppState;
    use crate::storage::MemoryStore;

    pub const PUBLIC_HOST: &str = "shortpath.test";

    pub fn app(store: &MemoryStore) -> (Router, AppState) {
        let mut config = AppConfig::default();
        config.public_host = PUBLIC_HOST.to_string();
        config.links.url_check_timeout_ms = 500;

        let state = AppState::with_store(config, Arc::new(store.clone())).unwrap();
        (super::create_router(state.clone()), state)
    }

    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    pub async fn get(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        send(app, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_json<T: DeserializeOwned>(app: &Router, uri: &str) -> (StatusCode, T) {
        let (status, _, body) = get(app, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_api_error_body() {
        let response = ApiError::bad_request("Invalid id parameter").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, ErrorResponse::new("Invalid id parameter"));
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let app: Router = Router::new()
            .route("/slow", get(|| async { tokio::time::sleep(Duration::from_secs(5)).await }))
            .route("/fast", get(|| async { "ok" }))
            .layer(timeout_layer(Duration::from_millis(50)));

        let slow = app.clone().oneshot(Request::get("/slow").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(slow.status(), StatusCode::REQUEST_TIMEOUT);

        let fast = app.oneshot(Request::get("/fast").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(fast.status(), StatusCode::OK);
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(ApiError::new(409, "x").status, StatusCode::CONFLICT);
        assert_eq!(ApiError::not_found("x").status, StatusCode::NOT_FOUND);
        assert_eq!(ApiError::internal("x").status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
