//! The request router: one worker instance over a store and a fetcher.

use super::background::BackgroundTasks;
use super::handlers::WorkerHandlers;
use super::lifecycle::{ActivateReport, AtomicWorkerState, InstallReport, WorkerState};
use super::messages::{
    ClientAction, FetchOutcome, MessageReply, Notification, NotificationAction,
    NotificationData, SyncReport, WorkerMessage,
};
use super::strategy::{classify, PrecacheManifest, Strategy};
use crate::cache::{CacheHandle, DynCacheStore, StoreStats};
use crate::config::WorkerConfig;
use crate::error::{Result, SwError};
use crate::models::{header, HeaderValue, Method, Request, RequestKey, Response};
use crate::network::DynFetcher;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

/// Worker routing requests through the cache strategies.
pub struct Router {
    config: WorkerConfig,
    manifest: PrecacheManifest,
    store: DynCacheStore,
    fetcher: DynFetcher,
    static_cache: CacheHandle,
    dynamic_cache: CacheHandle,
    image_cache: CacheHandle,
    offline_key: RequestKey,
    background: Arc<BackgroundTasks>,
    state: AtomicWorkerState,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
}

impl Router {
    /// Create a worker for `config`.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: WorkerConfig, store: DynCacheStore, fetcher: DynFetcher) -> Result<Self> {
        config.validate()?;
        let manifest = PrecacheManifest::from_config(&config)?;
        let offline_key = RequestKey::get(&config.resolve(&config.offline_document)?);

        let static_cache = CacheHandle::new(store.clone(), &config.namespaces.static_assets);
        let dynamic_cache = CacheHandle::new(store.clone(), &config.namespaces.dynamic);
        let image_cache = CacheHandle::new(store.clone(), &config.namespaces.images);

        Ok(Self {
            config,
            manifest,
            store,
            fetcher,
            static_cache,
            dynamic_cache,
            image_cache,
            offline_key,
            background: Arc::new(BackgroundTasks::new()),
            state: AtomicWorkerState::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn manifest(&self) -> &PrecacheManifest {
        &self.manifest
    }

    pub fn state(&self) -> WorkerState {
        self.state.load()
    }

    /// Tracker of detached revalidation work.
    pub fn background(&self) -> &Arc<BackgroundTasks> {
        &self.background
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    pub fn strategy_for(&self, request: &Request) -> Strategy {
        classify(&self.manifest, request)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }

    /// Read from one namespace; a failing store reads as a miss.
    async fn lookup(&self, cache: &CacheHandle, key: &RequestKey) -> Option<Response> {
        match cache.match_entry(key).await {
            Ok(entry) => entry.map(|stored| stored.response),
            Err(e) => {
                warn!("Cache read from '{}' failed for {}: {}", cache.name(), key, e);
                None
            }
        }
    }

    async fn lookup_any(&self, key: &RequestKey) -> Option<Response> {
        match self.store.match_any(key).await {
            Ok(entry) => entry.map(|stored| stored.response),
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Write a copy of a foreground response. Failures are logged only.
    async fn store_copy(&self, cache: &CacheHandle, key: &RequestKey, response: &Response) {
        if !response.is_cacheable() {
            debug!(
                "Not caching {} (status {}, type {})",
                key,
                response.status,
                response.response_type.as_str()
            );
            return;
        }
        if let Err(e) = cache.put_key(key, response).await {
            warn!("Cache write to '{}' failed for {}: {}", cache.name(), key, e);
        }
    }

    async fn cache_first(&self, request: &Request) -> FetchOutcome {
        let key = request.key();
        if let Some(cached) = self.lookup(&self.static_cache, &key).await {
            debug!("Cache hit for {}", key);
            return FetchOutcome::Respond(Some(cached));
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.store_copy(&self.static_cache, &key, &response).await;
                FetchOutcome::Respond(Some(response))
            }
            Err(e) => {
                debug!("Fetch failed for uncached {}: {}", key, e);
                FetchOutcome::Respond(None)
            }
        }
    }

    async fn stale_while_revalidate(&self, request: &Request) -> FetchOutcome {
        let key = request.key();
        let cached = self.lookup(&self.image_cache, &key).await;
        let (tx, rx) = oneshot::channel::<Option<Response>>();

        let fetcher = self.fetcher.clone();
        let cache = self.image_cache.clone();
        let pending = request.clone();
        self.background
            .spawn(format!("revalidate {}", key), async move {
                let response = match fetcher.fetch(&pending).await {
                    Ok(response) => response,
                    Err(e) => {
                        let _ = tx.send(None);
                        return Err(e);
                    }
                };
                let _ = tx.send(Some(response.clone()));
                if response.is_cacheable() {
                    cache.put(&pending, &response).await?;
                    debug!("Refreshed {} in '{}'", pending.url, cache.name());
                }
                Ok(())
            });

        if let Some(cached) = cached {
            debug!("Serving stale {} while revalidating", key);
            return FetchOutcome::Respond(Some(cached));
        }

        match rx.await {
            Ok(Some(response)) => FetchOutcome::Respond(Some(response)),
            _ => FetchOutcome::Respond(None),
        }
    }

    async fn cache_only(&self, request: &Request) -> FetchOutcome {
        let Some(entry) = self.manifest.entry_for(&request.url) else {
            return FetchOutcome::Respond(None);
        };
        let key = RequestKey::get(entry);
        let cached = self.lookup(&self.static_cache, &key).await;

        if cached.is_none() {
            debug!("Precached entry missing for {}", key);
        } else if self.config.revalidate_precached {
            self.schedule_update(entry.clone());
        }

        FetchOutcome::Respond(cached)
    }

    /// Refresh a precached entry on a detached task.
    fn schedule_update(&self, url: Url) {
        let fetcher = self.fetcher.clone();
        let cache = self.static_cache.clone();
        self.background.spawn(format!("update {}", url), async move {
            let request = Request::new(Method::GET, url);
            let response = fetcher.fetch(&request).await?;
            if response.is_cacheable() {
                cache.put(&request, &response).await?;
                debug!("Updated precached {}", request.url);
            }
            Ok(())
        });
    }

    async fn network_first(&self, request: &Request) -> FetchOutcome {
        let key = request.key();
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.store_copy(&self.dynamic_cache, &key, &response).await;
                FetchOutcome::Respond(Some(response))
            }
            Err(e) => {
                debug!("Network failed for {}, falling back to cache: {}", key, e);
                if let Some(cached) = self.lookup_any(&key).await {
                    return FetchOutcome::Respond(Some(cached));
                }
                if request.accepts_html() {
                    let offline = self.lookup_any(&self.offline_key).await;
                    if offline.is_none() {
                        warn!("Offline document {} is not cached", self.offline_key);
                    }
                    return FetchOutcome::Respond(offline);
                }
                FetchOutcome::Respond(None)
            }
        }
    }

    async fn refresh_feed(&self) -> Result<SyncReport> {
        let url = self.config.resolve(&self.config.sync.feed_url)?;
        let request = Request::new(Method::GET, url.clone())
            .with_header(header::ACCEPT, HeaderValue::from_static("application/json"));
        let response = self.fetcher.fetch(&request).await?;
        if !response.is_ok() {
            return Err(SwError::Network {
                message: format!("feed {} returned status {}", url, response.status),
                cause: None,
            });
        }

        let feed: serde_json::Value = serde_json::from_slice(&response.body)?;
        let body = serde_json::to_vec(&feed)?;
        let bytes = body.len();
        let stored = Response::ok(body)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let key = RequestKey::get(&url);
        self.dynamic_cache.put_key(&key, &stored).await?;
        info!("Synced feed {} ({} bytes)", url, bytes);

        Ok(SyncReport::Refreshed {
            key: key.to_string(),
            bytes,
        })
    }
}

#[async_trait]
impl WorkerHandlers for Router {
    async fn on_install(&self) -> Result<InstallReport> {
        self.state.transition(WorkerState::Installing)?;
        info!(
            "Installing {}: precaching {} resources",
            self.config.version,
            self.manifest.urls().len()
        );

        match self
            .static_cache
            .add_all(self.fetcher.as_ref(), self.manifest.urls())
            .await
        {
            Ok(precached) => {
                self.state.transition(WorkerState::Installed)?;
                self.skip_waiting.store(true, Ordering::SeqCst);
                Ok(InstallReport {
                    namespace: self.static_cache.name().to_string(),
                    precached,
                    skip_waiting: true,
                })
            }
            Err(e) => {
                warn!("Install of {} failed: {}", self.config.version, e);
                self.state.transition(WorkerState::Redundant)?;
                Err(e)
            }
        }
    }

    async fn on_activate(&self) -> Result<ActivateReport> {
        self.state.transition(WorkerState::Activating)?;

        let current = self.config.current_namespaces();
        let mut deleted = Vec::new();
        let cleanup = async {
            for name in self.store.keys().await? {
                if current.contains(&name) {
                    continue;
                }
                if self.store.delete_namespace(&name).await? {
                    info!("Removed old cache namespace '{}'", name);
                    deleted.push(name);
                }
            }
            Ok::<(), SwError>(())
        }
        .await;

        if let Err(e) = cleanup {
            warn!("Activation of {} failed: {}", self.config.version, e);
            self.state.transition(WorkerState::Installed)?;
            return Err(e);
        }

        self.state.transition(WorkerState::Activated)?;
        self.clients_claimed.store(true, Ordering::SeqCst);
        info!("Activated {}", self.config.version);

        Ok(ActivateReport {
            deleted,
            claimed: true,
        })
    }

    async fn on_fetch(&self, request: &Request) -> FetchOutcome {
        let strategy = self.strategy_for(request);
        debug!("{} {} -> {}", request.method, request.url, strategy);

        match strategy {
            Strategy::Bypass => FetchOutcome::Bypass,
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            Strategy::CacheOnly => self.cache_only(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
        }
    }

    async fn on_message(&self, message: WorkerMessage) -> MessageReply {
        debug!("Message received: {:?}", message);
        match message {
            WorkerMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                MessageReply::SkipWaiting {
                    state: self.state(),
                }
            }
            WorkerMessage::ClaimClients => {
                self.clients_claimed.store(true, Ordering::SeqCst);
                MessageReply::Claimed
            }
            WorkerMessage::GetVersion => MessageReply::Version {
                version: self.config.version.clone(),
            },
        }
    }

    fn on_push(&self, payload: Option<&str>) -> Notification {
        let settings = &self.config.notification;
        Notification {
            title: settings.title.clone(),
            body: payload
                .map(str::to_string)
                .unwrap_or_else(|| settings.default_body.clone()),
            icon: settings.icon.clone(),
            badge: settings.badge.clone(),
            vibrate: settings.vibrate.clone(),
            data: NotificationData {
                date_of_arrival: Utc::now(),
                primary_key: 1,
            },
            actions: vec![
                NotificationAction {
                    action: "explore".to_string(),
                    title: "View Now".to_string(),
                },
                NotificationAction {
                    action: "close".to_string(),
                    title: "Close".to_string(),
                },
            ],
        }
    }

    fn on_notification_click(&self, action: Option<&str>) -> ClientAction {
        match action {
            Some("close") => ClientAction::Close,
            _ => ClientAction::FocusOrOpen {
                url: self.config.notification.open_url.clone(),
            },
        }
    }

    async fn on_sync(&self, tag: &str) -> Result<SyncReport> {
        if tag != self.config.sync.tag {
            debug!("Ignoring sync tag '{}'", tag);
            return Ok(SyncReport::Ignored {
                tag: tag.to_string(),
            });
        }
        self.refresh_feed().await
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("version", &self.config.version)
            .field("state", &self.state())
            .finish()
    }
}
