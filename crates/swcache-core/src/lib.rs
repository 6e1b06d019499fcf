//! swcache Core - offline-first request router and cache-strategy engine.
//!
//! This crate routes intercepted GET requests through one of four cache
//! strategies (cache-first, stale-while-revalidate, cache-only,
//! network-first) over an opaque cache store and a network fetcher, and
//! manages the install/activate lifecycle of versioned cache namespaces.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use swcache_core::{HttpFetcher, MemoryStore, Request, Router, WorkerConfig, WorkerHandlers};
//!
//! #[tokio::main]
//! async fn main() -> swcache_core::Result<()> {
//!     let config = WorkerConfig::for_origin("https://blog.example").with_version("v2");
//!     let fetcher = HttpFetcher::new(&config.origin_url()?)?;
//!     let router = Router::new(config, Arc::new(MemoryStore::new()), Arc::new(fetcher))?;
//!
//!     router.on_install().await?;
//!     router.on_activate().await?;
//!
//!     let outcome = router.on_fetch(&Request::get("https://blog.example/")?).await;
//!     println!("served from cache: {:?}", outcome.response().map(|r| r.status));
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod worker;

pub use cache::{
    CacheHandle, CacheStore, DynCacheStore, MemoryStore, NamespaceMeta, SqliteStore, StoreStats,
    StoredResponse,
};
pub use config::{
    AppConfig, Namespaces, NetworkConfig, NotificationConfig, SyncConfig, WorkerConfig,
};
pub use error::{Result, SwError};
pub use models::{
    header, Destination, HeaderMap, HeaderName, HeaderValue, Method, Request, RequestKey,
    Response, ResponseType, StatusCode,
};
pub use network::{DynFetcher, Fetcher, HttpFetcher, ScriptedFetcher};
pub use worker::{
    classify, ActivateReport, BackgroundTasks, ClientAction, DynWorkerHandlers, FetchOutcome,
    InstallReport, MessageReply, Notification, PrecacheManifest, Router, Strategy, SyncReport,
    WorkerHandlers, WorkerMessage, WorkerState,
};
