//! HTTP boundary: metadata query, SSE download sessions and cookie upload.

use std::convert::Infallible;
use std::path::Path;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::downloader::session::AUTH_FAILED_MESSAGE;
use crate::downloader::{DownloadError, DownloadRequest, Downloader, VideoMetadata};

#[derive(Clone)]
pub struct AppState {
    pub downloader: Downloader,
}

pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        .route("/info", get(get_info))
        .route("/download", get(download))
        .route("/cookies", post(upload_cookies))
        .route("/cookies/status", get(cookies_status))
        .route("/health", get(health));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{0}")]
    BadRequest(String),

    /// No credential source worked
    #[error("{0}")]
    AuthFailed(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            HttpError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody { error: msg, message: None },
            ),
            HttpError::AuthFailed(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: "AUTH_FAILED".to_string(),
                    message: Some(msg),
                },
            ),
            HttpError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody { error: msg, message: None },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<DownloadError> for HttpError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::AuthFailed { .. } => HttpError::AuthFailed(AUTH_FAILED_MESSAGE.to_string()),
            DownloadError::MissingUrl => HttpError::BadRequest(err.to_string()),
            other => HttpError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InfoQuery {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    url: Option<String>,
    quality: Option<String>,
    format: Option<String>,
}

async fn get_info(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>,
) -> Result<Json<VideoMetadata>, HttpError> {
    let url = query.url.ok_or(DownloadError::MissingUrl)?;
    let metadata = state.downloader.get_video_info(&url).await?;
    Ok(Json(metadata))
}

/// Stream one download session as server-sent events.
///
/// The session is cancelled (and its worker killed) when the client
/// disconnects and axum drops the stream.
async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>, HttpError> {
    let request = DownloadRequest::new(
        query.url.as_deref(),
        query.quality.as_deref(),
        query.format.as_deref(),
    )?;

    let (handle, events) = state.downloader.download(request);
    let guard = handle.token().drop_guard();

    let stream = UnboundedReceiverStream::new(events).filter_map(move |event| {
        let _session = &guard;
        match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(e) => {
                tracing::warn!("Failed to serialize event: {}", e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

async fn upload_cookies(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, HttpError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(HttpError::BadRequest("Empty cookies file".to_string()));
    }

    state
        .downloader
        .credentials()
        .cookie_store()
        .save(&body)
        .await
        .map_err(DownloadError::from)?;

    Ok(Json(json!({ "ok": true })))
}

async fn cookies_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let exists = state.downloader.credentials().cookie_store().exists();
    Json(json!({ "exists": exists }))
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::orchestrator::tests::downloader;
    use crate::downloader::runner::testing::{auth, fatal, success, Script, ScriptedRunner};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(dir: &Path, scripts: Vec<Script>) -> Router {
        let runner = Arc::new(ScriptedRunner::new(scripts));
        router(AppState { downloader: downloader(dir, runner) }, None)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(app(dir.path(), vec![]), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_info_requires_url() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(app(dir.path(), vec![]), get("/info")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["error"], "Missing url");
    }

    #[tokio::test]
    async fn test_info_success() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = vec![
            Script::outcome(auth()),
            Script::outcome(success(r#"{"title":"My Video","id":"abc","duration_string":"1:15"}"#)),
        ];

        let (status, body) = send(app(dir.path(), scripts), get("/info?url=https%3A%2F%2Fyoutu.be%2Fabc")).await;
        assert_eq!(status, StatusCode::OK);

        let body = json(&body);
        assert_eq!(body["title"], "My Video");
        assert_eq!(body["duration"], "1:15");
        assert_eq!(body["credential"], "Firefox");
    }

    #[tokio::test]
    async fn test_info_auth_failed_is_401() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = vec![Script::outcome(auth()); 2];

        let (status, body) = send(app(dir.path(), scripts), get("/info?url=x")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            json(&body),
            json!({"error": "AUTH_FAILED", "message": AUTH_FAILED_MESSAGE})
        );
    }

    #[tokio::test]
    async fn test_info_fatal_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = vec![Script::outcome(fatal("ERROR: Unsupported URL"))];

        let (status, body) = send(app(dir.path(), scripts), get("/info?url=x")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(&body), json!({"error": "ERROR: Unsupported URL"}));
    }

    #[tokio::test]
    async fn test_download_requires_url() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = send(app(dir.path(), vec![]), get("/download?quality=720p")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_streams_events() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = vec![
            Script::outcome(auth()),
            Script::lines(
                &["[download]  42.3% of  280.89MiB at  389.41KiB/s ETA 10:14"],
                success(""),
            ),
        ];

        let response = app(dir.path(), scripts)
            .oneshot(get("/download?url=x&format=mp3"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let events: Vec<serde_json::Value> = String::from_utf8_lossy(&body)
            .lines()
            .filter_map(|l| l.strip_prefix("data: "))
            .map(|d| serde_json::from_str(d).unwrap())
            .collect();

        let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["start", "info", "progress", "done"]);
        assert_eq!(events[1]["message"], "Authenticated via Firefox");
        assert_eq!(events[2]["percent"], 42.3);
        assert_eq!(events[3]["output"], "mp3");
    }

    #[tokio::test]
    async fn test_download_auth_failed_event() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = vec![Script::outcome(auth()); 2];

        let (status, body) = send(app(dir.path(), scripts), get("/download?url=x")).await;
        assert_eq!(status, StatusCode::OK);

        let text = String::from_utf8_lossy(&body);
        assert!(text.contains(r#""type":"auth_failed""#));
        assert!(!text.contains(r#""type":"error""#));
    }

    #[tokio::test]
    async fn test_cookie_upload_and_status() {
        let dir = tempfile::tempdir().unwrap();

        let (_, body) = send(app(dir.path(), vec![]), get("/cookies/status")).await;
        assert_eq!(json(&body), json!({"exists": false}));

        let upload = Request::builder()
            .method("POST")
            .uri("/cookies")
            .body(Body::from("# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t0\tSID\tx\n"))
            .unwrap();
        let (status, body) = send(app(dir.path(), vec![]), upload).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body), json!({"ok": true}));

        let (_, body) = send(app(dir.path(), vec![]), get("/cookies/status")).await;
        assert_eq!(json(&body), json!({"exists": true}));
    }

    #[tokio::test]
    async fn test_empty_cookie_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let upload = Request::builder()
            .method("POST")
            .uri("/cookies")
            .body(Body::from(" \n"))
            .unwrap();

        let (status, _) = send(app(dir.path(), vec![]), upload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!dir.path().join("cookies.txt").exists());
    }

    #[tokio::test]
    async fn test_cookie_save_failure_is_500() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("cookies.txt")).unwrap();
        std::fs::write(dir.path().join("cookies.txt").join("keep"), "x").unwrap();

        let upload = Request::builder()
            .method("POST")
            .uri("/cookies")
            .body(Body::from("# Netscape HTTP Cookie File\n"))
            .unwrap();
        let (status, body) = send(app(dir.path(), vec![]), upload).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json(&body)["error"].as_str().unwrap().starts_with("IO error"));
    }
}
