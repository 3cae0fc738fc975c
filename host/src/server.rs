//! ==============================================================================
//! server.rs - http api
//! ==============================================================================
//!
//! routes:
//!     GET  /api            current snapshot of every node (live state replay)
//!     POST /api/frames     raw frame text in, merged snapshots out
//!     GET  /api/nodes      distinct node ids found in the log
//!     GET  /api/history    node/date/time-window query over the log
//!     GET  /download       the raw log file
//!
//! the query routes never return an error body: missing data is `[]`.
//!
//! ==============================================================================

use crate::aggregator::StateAggregator;
use crate::domain::Snapshot;
use crate::query::{self, HistoryPoint, QueryEngine, TimeWindow};

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use log::{info, warn};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

// ==============================================================================
// shared state
// ==============================================================================
// the aggregator handle is cheap to clone (arc inside); the query engine
// only holds the log path and reads the file per request.

#[derive(Clone)]
pub struct HubState {
    pub aggregator: StateAggregator,
    pub query: QueryEngine,
}

pub fn router(state: HubState) -> Router {
    Router::new()
        .route("/api", get(api_handler))
        .route("/api/frames", post(frames_handler))
        .route("/api/nodes", get(nodes_handler))
        .route("/api/history", get(history_handler))
        .route("/download", get(download_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(bind: &str, state: HubState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind http listener on {}", bind))?;
    info!("[HTTP] Api live at http://{}", bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// current state of every node
pub async fn api_handler(State(state): State<HubState>) -> Json<Vec<Snapshot>> {
    Json(state.aggregator.current().await)
}

/// push a raw frame (same text the gateway relays) through the pipeline
pub async fn frames_handler(State(state): State<HubState>, body: String) -> Json<Vec<Snapshot>> {
    let merged = state.aggregator.ingest_frame(&body).await;
    if merged.is_empty() {
        warn!("[HTTP] Frame without usable sections ({} bytes)", body.len());
    }
    Json(merged)
}

pub async fn nodes_handler(State(state): State<HubState>) -> Json<Vec<String>> {
    let engine = state.query.clone();
    let nodes = tokio::task::spawn_blocking(move || engine.nodes())
        .await
        .unwrap_or_default();
    Json(nodes)
}

/// history query params, the gateway dashboard's spanish names are accepted too
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    #[serde(alias = "nodo")]
    pub node: Option<String>,
    /// `DD/MM/YYYY` as stored, or `YYYY-MM-DD`
    #[serde(alias = "fecha")]
    pub date: Option<String>,
    #[serde(alias = "desdeHora")]
    pub from: Option<String>,
    #[serde(alias = "hastaHora")]
    pub to: Option<String>,
}

pub async fn history_handler(
    State(state): State<HubState>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<HistoryPoint>> {
    let (Some(node), Some(date)) = (params.node, params.date) else {
        return Json(Vec::new());
    };
    if node.trim().is_empty() || date.trim().is_empty() {
        return Json(Vec::new());
    }

    let date = query::normalize_date(&date);
    let window = TimeWindow::parse(params.from.as_deref(), params.to.as_deref());
    let engine = state.query.clone();
    let points = tokio::task::spawn_blocking(move || engine.history(node.trim(), &date, window))
        .await
        .unwrap_or_default();
    Json(points)
}

pub async fn download_handler(State(state): State<HubState>) -> Response {
    let path = state.query.path().to_path_buf();
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "log.txt".to_string());
            (
                [
                    (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", filename),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            warn!("[HTTP] Download of {} failed: {}", path.display(), e);
            (StatusCode::NOT_FOUND, "log file not available").into_response()
        }
    }
}
