//! In-memory fetcher with scripted responses.
//!
//! Used by tests and demos to stand in for the network: each URL is mapped to
//! a response or a failure, the whole fetcher can be switched offline, and
//! every call is recorded.

use super::fetcher::Fetcher;
use crate::error::{Result, SwError};
use crate::models::{Request, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
enum Route {
    Respond(Response),
    Fail(String),
}

/// Fetcher that answers from a table instead of the network.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

fn route_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `response` from now on.
    pub fn respond(&self, url: &str, response: Response) -> &Self {
        self.set_route(url, Route::Respond(response));
        self
    }

    /// Fail every fetch of `url` with a network error.
    pub fn fail(&self, url: &str) -> &Self {
        self.set_route(url, Route::Fail(format!("{} unreachable", url)));
        self
    }

    /// Fail every fetch regardless of route.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of fetches of `url`.
    pub fn call_count(&self, url: &str) -> usize {
        let key = match Url::parse(url) {
            Ok(u) => route_key(&u),
            Err(_) => url.to_string(),
        };
        self.calls().iter().filter(|c| **c == key).count()
    }

    fn set_route(&self, url: &str, route: Route) {
        let key = match Url::parse(url) {
            Ok(u) => route_key(&u),
            Err(_) => url.to_string(),
        };
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(key, route);
        }
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let key = route_key(&request.url);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(key.clone());
        }

        let latency = self.latency.lock().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(SwError::network(format!("{} failed: offline", request.url)));
        }

        let route = self
            .routes
            .lock()
            .map_err(|e| SwError::Other(format!("route table poisoned: {}", e)))?
            .get(&key)
            .cloned();

        match route {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Fail(message)) => Err(SwError::network(message)),
            None => Err(SwError::network(format!("no route for {}", key))),
        }
    }
}
