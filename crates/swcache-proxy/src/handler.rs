//! Proxy request handlers.
//!
//! Control endpoints translate HTTP calls into worker events. Every other
//! request is converted into a worker request and routed through `on_fetch`.

use crate::server::AppState;
use axum::{
    body::{to_bytes, Body},
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use swcache_core::{
    Destination, FetchOutcome, Fetcher, Request, Response as WorkerResponse, Strategy,
    WorkerHandlers, WorkerMessage,
};
use tracing::{debug, warn};

/// Largest request body the proxy buffers before forwarding.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Response header naming the strategy that answered.
const STRATEGY_HEADER: HeaderName = HeaderName::from_static("x-swcache-strategy");

/// Notification click payload.
#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    #[serde(default)]
    pub action: Option<String>,
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

/// Health check endpoint.
pub async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entries = state
        .worker
        .stats()
        .await
        .map(|stats| stats.total_entries)
        .ok();
    Json(json!({
        "status": "ok",
        "state": state.worker.state(),
        "version": state.worker.config().version,
        "entries": entries,
    }))
}

/// Deliver a page message to the worker.
pub async fn handle_message(State(state): State<Arc<AppState>>, body: String) -> Response {
    match WorkerMessage::parse(&body) {
        Ok(message) => Json(state.worker.on_message(message).await).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

/// Deliver a push payload; returns the notification to show.
pub async fn handle_push(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let text = String::from_utf8_lossy(&body);
    let payload = if text.is_empty() {
        None
    } else {
        Some(text.as_ref())
    };
    Json(state.worker.on_push(payload))
}

/// Deliver a notification click; returns what the client should do.
pub async fn handle_notification_click(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ClickRequest>>,
) -> impl IntoResponse {
    let action = body.and_then(|Json(click)| click.action);
    Json(state.worker.on_notification_click(action.as_deref()))
}

/// Fire a background sync event.
///
/// Failures answer 502 so the caller knows to retry later.
pub async fn handle_sync(State(state): State<Arc<AppState>>, Path(tag): Path<String>) -> Response {
    match state.worker.on_sync(&tag).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            warn!("Sync '{}' failed: {}", tag, e);
            error_response(StatusCode::BAD_GATEWAY, e)
        }
    }
}

/// Convert an incoming HTTP request into a worker request against the origin.
async fn to_worker_request(
    state: &AppState,
    request: axum::extract::Request,
) -> anyhow::Result<Request> {
    let (parts, body) = request.into_parts();

    // Keep the path root-relative so it cannot name another host.
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let path = format!("/{}", path.trim_start_matches('/'));
    let url = state.worker.config().resolve(&path)?;

    let destination = parts
        .headers
        .get("sec-fetch-dest")
        .and_then(|v| v.to_str().ok())
        .map(Destination::from_fetch_dest)
        .unwrap_or_default();

    let body = to_bytes(body, MAX_BODY_BYTES).await?;

    let mut request = Request::new(parts.method, url)
        .with_destination(destination)
        .with_body(body);
    request.headers = parts.headers;
    Ok(request)
}

/// Convert a worker response into an HTTP response.
fn into_http(response: WorkerResponse, strategy: Strategy) -> Response {
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = response.headers;
    // The body is re-framed, so the upstream length no longer applies.
    out.headers_mut().remove(header::CONTENT_LENGTH);
    out.headers_mut()
        .insert(STRATEGY_HEADER, HeaderValue::from_static(strategy.as_str()));
    out
}

/// Route any other request through the worker.
pub async fn handle_fetch(
    State(state): State<Arc<AppState>>,
    request: axum::extract::Request,
) -> Response {
    let request = match to_worker_request(&state, request).await {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    let strategy = state.worker.strategy_for(&request);
    match state.worker.on_fetch(&request).await {
        FetchOutcome::Respond(Some(response)) => into_http(response, strategy),
        FetchOutcome::Respond(None) => {
            debug!("No response for {} {}", request.method, request.url);
            (
                StatusCode::GATEWAY_TIMEOUT,
                [(STRATEGY_HEADER, HeaderValue::from_static(strategy.as_str()))],
            )
                .into_response()
        }
        FetchOutcome::Bypass => match state.upstream.fetch(&request).await {
            Ok(response) => into_http(response, strategy),
            Err(e) => {
                warn!("Upstream {} {} failed: {}", request.method, request.url, e);
                error_response(StatusCode::BAD_GATEWAY, e)
            }
        },
    }
}
