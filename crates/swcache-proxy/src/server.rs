//! HTTP server implementation using Axum.

use crate::handler::{
    handle_fetch, handle_health, handle_message, handle_notification_click, handle_push,
    handle_sync,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use swcache_core::{DynFetcher, Router as Worker};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Requests handled at once before new ones queue.
const MAX_CONCURRENT_REQUESTS: usize = 256;

/// Application state shared across handlers.
pub struct AppState {
    /// The worker every page request is routed through
    pub worker: Arc<Worker>,
    /// Fetcher used for requests the worker does not intercept
    pub upstream: DynFetcher,
}

/// Build the application router.
pub fn build_app(worker: Arc<Worker>, upstream: DynFetcher) -> Router {
    let state = Arc::new(AppState { worker, upstream });

    // Control endpoints may be called from any page
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let control = Router::new()
        .route("/__sw/health", get(handle_health))
        .route("/__sw/message", post(handle_message))
        .route("/__sw/push", post(handle_push))
        .route("/__sw/notification-click", post(handle_notification_click))
        .route("/__sw/sync/:tag", post(handle_sync))
        .layer(cors);

    Router::new()
        .merge(control)
        .fallback(handle_fetch)
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the proxy server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    worker: Arc<Worker>,
    upstream: DynFetcher,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let app = build_app(worker, upstream);

    // Parse the address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    // Bind to the address
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
