use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use axum::{
    Json, Router,
    extract::{Path as UrlPath, State},
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use jiff::Timestamp;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    announcement::AnnouncementKind, app::AppState, board::BoardStatus, detector::DetectorError,
    schedule::Schedule,
};

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

const NOT_FOUND_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>404 - File Not Found</title>
    <style>
        body { font-family: Arial, sans-serif; text-align: center; padding: 50px; background: #0d4f3c; color: #e8f5e8; }
        h1 { color: #a8d8a8; }
        a { color: #a8d8a8; text-decoration: none; }
        a:hover { text-decoration: underline; }
    </style>
</head>
<body>
    <h1>404 - File Not Found</h1>
    <p>The requested file was not found on this server.</p>
    <a href="/">Go back to home</a>
</body>
</html>
"#;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/schedule", get(schedule))
        .route("/api/rounds/{id}/announce/{kind}", post(announce))
        .route("/api/rounds/{id}/reset", post(reset))
        .fallback(get(static_file))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, root = %state.config.root.display(), "status board listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn status(State(state): State<AppState>) -> Json<BoardStatus> {
    Json(state.status(Timestamp::now()))
}

async fn schedule(State(state): State<AppState>) -> Json<Schedule> {
    Json(state.schedule.as_ref().clone())
}

#[derive(Debug, Serialize)]
struct Queued {
    round: String,
    kind: AnnouncementKind,
}

async fn announce(
    State(state): State<AppState>,
    UrlPath((id, kind)): UrlPath<(String, String)>,
) -> Result<(StatusCode, Json<Queued>), ApiError> {
    let kind = kind.parse::<AnnouncementKind>().map_err(ApiError::bad_request)?;
    state.announce(&id, kind)?;
    Ok((StatusCode::ACCEPTED, Json(Queued { round: id, kind })))
}

async fn reset(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> Result<StatusCode, ApiError> {
    state.reset(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<DetectorError> for ApiError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::UnknownRound(_) => Self {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

async fn static_file(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(relative) = resolve_request_path(uri.path()) else {
        warn!(path = uri.path(), "rejected path outside root");
        return (
            StatusCode::FORBIDDEN,
            [(header::CONTENT_TYPE, "text/plain")],
            "Forbidden",
        )
            .into_response();
    };
    let path = state.config.root.join(&relative);

    match tokio::fs::read(&path).await {
        Ok(contents) => (
            [
                (header::CONTENT_TYPE, content_type(&path)),
                (header::CACHE_CONTROL, NO_CACHE),
                (header::PRAGMA, "no-cache"),
                (header::EXPIRES, "0"),
            ],
            contents,
        )
            .into_response(),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response()
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read file");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                format!("Server Error: {:?}", err.kind()),
            )
                .into_response()
        }
    }
}

/// Maps a request path onto a path relative to the served root, resolving
/// `.` and `..` lexically. `None` when the path climbs above the root.
pub fn resolve_request_path(request: &str) -> Option<PathBuf> {
    let mut parts: Vec<&str> = Vec::new();
    for part in request.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            part if part.contains('\\') || part.contains(':') => return None,
            part => parts.push(part),
        }
    }
    if parts.is_empty() {
        return Some(PathBuf::from("index.html"));
    }
    Some(parts.iter().collect())
}

pub fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("html") => "text/html",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogg") => "video/ogg",
        _ => "application/octet-stream",
    }
}
