#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use media_client::player::MediaElement;
use media_client::{PlayerError, Transport};
use serde_json::json;

#[derive(Clone, Default)]
pub struct ServerState {
    pub status_polls: Arc<AtomicU32>,
    pub ready_after: u32,
    pub scan_ok: bool,
    pub stopped: Arc<Mutex<Vec<String>>>,
}

pub fn catalog_json() -> serde_json::Value {
    json!({
        "media_files": [
            {
                "id": "1",
                "filename": "Holiday.MP4",
                "format": "mp4",
                "size": "1048576",
                "duration": "125.5",
                "created_time": "2024-03-01 10:00:00",
                "width": "1920",
                "height": "1080",
                "bitrate": "4000000"
            },
            {
                "id": "2",
                "filename": "concert.mkv",
                "format": "matroska,webm",
                "size": 2048,
                "duration": "",
                "created_time": "2024-03-02 11:30:00",
                "width": "0"
            },
            {
                "id": "3",
                "filename": "notes.wav",
                "format": "",
                "size": "not-a-number",
                "duration": 30
            }
        ],
        "count": "3"
    })
}

async fn media_list() -> Json<serde_json::Value> {
    Json(catalog_json())
}

async fn media_details(Path(id): Path<String>) -> impl IntoResponse {
    let list = catalog_json();
    let found = list["media_files"]
        .as_array()
        .and_then(|files| files.iter().find(|f| f["id"] == id.as_str()).cloned());
    match found {
        Some(record) => Json(record).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response(),
    }
}

async fn scan(State(state): State<ServerState>) -> Json<serde_json::Value> {
    if state.scan_ok {
        Json(json!({"success": true, "message": "Media library rescanned"}))
    } else {
        Json(json!({"success": false, "message": "scan already running"}))
    }
}

async fn status() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "time": "2024-03-01 10:00:00", "uptime": "3725", "version": "1.2.0"}))
}

async fn hls_create(
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Json<serde_json::Value> {
    match params.get("media_id") {
        Some(id) if !id.is_empty() => Json(json!({"success": true, "stream_id": format!("stream_{}", id)})),
        _ => Json(json!({"success": false, "error": "media_id required"})),
    }
}

async fn hls_status(
    State(state): State<ServerState>,
    Path(_id): Path<String>,
) -> Json<serde_json::Value> {
    let polls = state.status_polls.fetch_add(1, Ordering::SeqCst) + 1;
    if polls >= state.ready_after {
        Json(json!({"status": "ready", "progress": "100"}))
    } else {
        Json(json!({"status": "preparing", "progress": polls * 10}))
    }
}

async fn hls_stop(State(state): State<ServerState>, Path(id): Path<String>) -> Json<serde_json::Value> {
    state.stopped.lock().unwrap().push(id);
    Json(json!({"success": true}))
}

async fn hls_list() -> Json<serde_json::Value> {
    Json(json!({"streams": ["stream_1", "stream_2"], "count": 2}))
}

async fn master_playlist(Path(_id): Path<String>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")],
        "#EXTM3U\n\
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
360p/index.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720\n\
720p/index.m3u8\n",
    )
}

async fn session_create(
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let id = params.get("media_id").cloned().unwrap_or_default();
    Json(json!({"success": true, "session_id": format!("sess-{}", id)}))
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/media/list", get(media_list))
        .route("/api/media/scan", get(scan))
        .route("/api/media/:id", get(media_details))
        .route("/api/session/create", get(session_create))
        .route("/api/hls/create", get(hls_create))
        .route("/api/hls/status/:id", get(hls_status))
        .route("/api/hls/stop/:id", get(hls_stop))
        .route("/api/hls/list", get(hls_list))
        .route("/hls/:id/playlist.m3u8", get(master_playlist))
        .route("/plain", get(|| async { "just text" }))
        .route(
            "/broken",
            get(|| async { ([(header::CONTENT_TYPE, "application/json")], "{not json") }),
        )
        .route(
            "/fail",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .with_state(state)
}

/// Serve `router` on an ephemeral port; returns the base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn transport(base_url: &str) -> Transport {
    Transport::new(base_url, Duration::from_secs(5)).unwrap()
}

/// Media element that records the sources it was given.
#[derive(Clone, Default)]
pub struct RecordingElement {
    pub sources: Arc<Mutex<Vec<Option<String>>>>,
    pub playing: Arc<Mutex<bool>>,
}

#[async_trait]
impl MediaElement for RecordingElement {
    fn can_play_hls(&self) -> bool {
        true
    }

    async fn set_source(&mut self, url: Option<&str>) -> Result<(), PlayerError> {
        self.sources.lock().unwrap().push(url.map(str::to_string));
        Ok(())
    }

    async fn play(&mut self) -> Result<(), PlayerError> {
        *self.playing.lock().unwrap() = true;
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), PlayerError> {
        *self.playing.lock().unwrap() = false;
        Ok(())
    }

    async fn seek_start(&mut self) -> Result<(), PlayerError> {
        Ok(())
    }
}
