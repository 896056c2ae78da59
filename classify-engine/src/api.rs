//! HTTP surface: event stream passthrough and health

use crate::Classify;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub classify: Arc<Classify>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(classify: Arc<Classify>) -> Self {
        Self {
            classify,
            startup_time: Utc::now(),
        }
    }
}

/// GET /stream: every collection event as one SSE message
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    classify_common::sse::event_stream(state.classify.subscribe(), "classify")
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = Utc::now() - state.startup_time;
    Json(json!({
        "status": "ok",
        "module": "classify",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime.num_seconds(),
        "collections": state.classify.get_collections().await.len(),
        "subscribers": state.classify.bus().subscriber_count(),
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stream", get(event_stream))
        .route("/health", get(health))
}
