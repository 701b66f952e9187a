//! Shortcut redirects and link submission.

use axum::{
    Json,
    extract::{OriginalUri, State},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use shortpath_common::{CreateLinkRequest, CreateLinkResponse, InsertError, ResolveError};

use super::ApiError;
use crate::links::{insert, resolve, shortcut};
use crate::state::AppState;

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// Resolve the request path and redirect to its target
pub async fn redirect(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path = uri.path();
    let segments = match state.path_rules.validate(path) {
        Ok(segments) => segments,
        Err(e) => {
            tracing::debug!(path, error = %e, "Rejected shortcut path");
            return not_found();
        }
    };

    match resolve(state.store.as_ref(), &segments).await {
        Ok(url) => {
            tracing::debug!(path, url = %url, "Redirecting");
            (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
        }
        Err(e @ ResolveError::Storage(_)) => {
            tracing::error!(path, error = %e, "Storage failure while resolving");
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, "Internal Server Error").into_response()
        }
        Err(_) => not_found(),
    }
}

/// Register a new shortcut
pub async fn create_link(
    State(state): State<AppState>,
    Json(request): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<CreateLinkResponse>), ApiError> {
    if !state
        .challenges
        .verify(&request.challenge_id, &request.challenge_answer)
    {
        return Err(ApiError::bad_request("Anti-bot challenge failed"));
    }

    let segments = state
        .path_rules
        .validate(&request.path)
        .map_err(|e| ApiError::new(e.status_code(), format!("Invalid shortcut: {e}")))?;

    let redirect = state.url_checker.verify(&request.url).await.map_err(|e| {
        tracing::warn!(url = %request.url, error = %e, "Redirect target failed the liveness check");
        ApiError::new(e.status_code(), format!("Invalid redirect link: {e}"))
    })?;

    match insert(state.store.as_ref(), &redirect, &segments).await {
        Ok(()) => Ok((
            StatusCode::CREATED,
            Json(CreateLinkResponse {
                shortcut: shortcut(&segments),
                redirect,
            }),
        )),
        Err(e) if e.is_conflict() => Err(ApiError::new(e.status_code(), e.to_string())),
        Err(InsertError::InvalidPath(e)) => Err(ApiError::bad_request(format!("Invalid shortcut: {e}"))),
        Err(e) => {
            tracing::error!(path = %request.path, error = %e, "Saving new link failed");
            Err(ApiError::internal(format!("Saving new link failed: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::challenge::solve;
    use crate::routes::test_support::{app, get, send};
    use crate::state::AppState;
    use crate::storage::MemoryStore;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
        routing::get as get_route,
    };
    use serde_json::json;
    use shortpath_common::{CreateLinkResponse, ErrorResponse};
    use std::net::SocketAddr;

    async fn spawn_target() -> SocketAddr {
        let target = Router::new()
            .route("/", get_route(|| async { "ok" }))
            .route("/gone", get_route(|| async { StatusCode::GONE }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, target).await.unwrap();
        });
        addr
    }

    /// POST /api/link with a freshly solved challenge
    async fn submit(app: &Router, state: &AppState, url: &str, path: &str) -> (StatusCode, Vec<u8>) {
        let challenge = state.challenges.get_challenge();
        let body = json!({
            "url": url,
            "path": path,
            "challenge_id": challenge.id,
            "challenge_answer": solve(&challenge.question),
        });
        let request = Request::post("/api/link")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, body) = send(app, request).await;
        (status, body)
    }

    fn error_of(body: &[u8]) -> String {
        serde_json::from_slice::<ErrorResponse>(body).unwrap().error
    }

    #[tokio::test]
    async fn test_redirect() {
        let store = MemoryStore::new();
        let foo = store.seed(None, "foo", None).await;
        store.seed(Some(foo.id), "bar", Some("https://example.com/")).await;
        let (app, _) = app(&store);

        let (status, headers, _) = get(&app, "/foo/bar").await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(headers[header::LOCATION], "https://example.com/");

        let (status, headers, _) = get(&app, "/foo/bar/").await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(headers[header::LOCATION], "https://example.com/");

        for uri in ["/", "/foo", "/nope", "/foo/nope", "/Foo/bar", "/api/foo/bar", "/static-x"] {
            let (status, _, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "uri={uri}");
            assert_eq!(body, b"Not Found", "uri={uri}");
        }
    }

    #[tokio::test]
    async fn test_redirect_storage_failure_is_not_a_miss() {
        let store = MemoryStore::new();
        store.seed(None, "foo", Some("https://example.com/")).await;
        let (app, _) = app(&store);
        store.fail_after(0);

        let (status, headers, body) = get(&app, "/foo").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(headers.get(header::LOCATION).is_none());
        assert_eq!(body, b"Internal Server Error");

        // Back to normal once the backend recovers
        store.heal();
        let (status, _, _) = get(&app, "/foo").await;
        assert_eq!(status, StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_redirect_rejects_other_methods() {
        let (app, _) = app(&MemoryStore::new());
        let request = Request::post("/foo").body(Body::empty()).unwrap();
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_create_link_then_follow_it() {
        let target = spawn_target().await;
        let store = MemoryStore::new();
        let (app, state) = app(&store);

        let url = format!("{target}/");
        let (status, body) = submit(&app, &state, &url, "/my/link/").await;
        assert_eq!(status, StatusCode::CREATED, "{}", String::from_utf8_lossy(&body));

        let created: CreateLinkResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(created.shortcut, "/my/link");
        assert_eq!(created.redirect, format!("http://{target}/"));

        let (status, headers, _) = get(&app, "/my/link").await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(headers[header::LOCATION], created.redirect.as_str());

        // Intermediate node exists but has no target
        let (status, _, _) = get(&app, "/my").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_link_conflicts() {
        let target = spawn_target().await;
        let store = MemoryStore::new();
        let (app, state) = app(&store);

        let url = format!("http://{target}/");
        let (status, _) = submit(&app, &state, &url, "taken").await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = submit(&app, &state, &url, "taken").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_of(&body), "Link already exists");

        let elsewhere = format!("http://{target}/?other");
        let (status, body) = submit(&app, &state, &elsewhere, "taken").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_of(&body), "Link points elsewhere");
    }

    #[tokio::test]
    async fn test_create_link_rejections() {
        let target = spawn_target().await;
        let store = MemoryStore::new();
        let (app, state) = app(&store);
        let ok_url = format!("http://{target}/");

        let (status, body) = submit(&app, &state, &ok_url, "api/x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error_of(&body).starts_with("Invalid shortcut: "));

        let (status, body) = submit(&app, &state, &ok_url, "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error_of(&body).starts_with("Invalid shortcut: "));

        let (status, body) = submit(&app, &state, &format!("http://{target}/gone"), "gone").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_of(&body), "Invalid redirect link: link responded with status code 410");

        let (status, body) = submit(&app, &state, "https://shortpath.test/loop", "loop").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error_of(&body).starts_with("Invalid redirect link: "));

        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_link_requires_challenge() {
        let target = spawn_target().await;
        let store = MemoryStore::new();
        let (app, state) = app(&store);

        let challenge = state.challenges.get_challenge();
        let body = json!({
            "url": format!("http://{target}/"),
            "path": "bot",
            "challenge_id": challenge.id,
            "challenge_answer": "not a number",
        });
        let request = Request::post("/api/link")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_of(&body), "Anti-bot challenge failed");
        // The failed attempt used up the challenge
        assert_eq!(state.challenges.len(), 0);
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_link_storage_failure() {
        let target = spawn_target().await;
        let store = MemoryStore::new();
        let (app, state) = app(&store);
        store.fail_after(0);

        let (status, body) = submit(&app, &state, &format!("http://{target}/"), "down").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_of(&body), "Saving new link failed: backend error: injected failure");
    }

    #[tokio::test]
    async fn test_create_link_malformed_body() {
        let (app, _) = app(&MemoryStore::new());
        let request = Request::post("/api/link")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"url\": 1}"))
            .unwrap();
        let (status, _, _) = send(&app, request).await;
        assert!(status.is_client_error());
    }
}
