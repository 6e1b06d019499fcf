//! Request classification.
//!
//! `classify` is a pure function of the request and the precache manifest.
//! Rules are evaluated in order and the first match wins:
//!
//! 1. non-GET → bypass
//! 2. non-HTTP(S) scheme → bypass
//! 3. font → cache-first
//! 4. image → stale-while-revalidate
//! 5. precached path → cache-only
//! 6. anything else → network-first

use crate::config::{same_resource, WorkerConfig};
use crate::error::Result;
use crate::models::{Destination, Method, Request};
use serde::Serialize;
use url::Url;

/// How a request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Not intercepted; the host performs its default network handling.
    Bypass,
    /// Cache hit wins; a miss is fetched and stored.
    CacheFirst,
    /// Cached copy now, fresher copy stored in the background.
    StaleWhileRevalidate,
    /// Precached copy or nothing.
    CacheOnly,
    /// Network wins; cache and offline document are fallbacks.
    NetworkFirst,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Bypass => "bypass",
            Strategy::CacheFirst => "cache-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
            Strategy::CacheOnly => "cache-only",
            Strategy::NetworkFirst => "network-first",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved precache manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheManifest {
    urls: Vec<Url>,
}

impl PrecacheManifest {
    /// Resolve every manifest entry against the configured origin.
    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
        let urls = config
            .precache
            .iter()
            .map(|entry| config.resolve(entry))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { urls })
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    /// Whether `url` names a precached resource.
    ///
    /// Compares origin and path; query string and fragment are ignored.
    pub fn contains(&self, url: &Url) -> bool {
        self.entry_for(url).is_some()
    }

    /// The manifest URL naming the same resource as `url`.
    pub fn entry_for(&self, url: &Url) -> Option<&Url> {
        self.urls.iter().find(|u| same_resource(u, url))
    }
}

/// Pick the strategy for a request.
pub fn classify(manifest: &PrecacheManifest, request: &Request) -> Strategy {
    if request.method != Method::GET {
        return Strategy::Bypass;
    }
    if !request.is_http() {
        return Strategy::Bypass;
    }
    match request.destination {
        Destination::Font => return Strategy::CacheFirst,
        Destination::Image => return Strategy::StaleWhileRevalidate,
        _ => {}
    }
    if manifest.contains(&request.url) {
        return Strategy::CacheOnly;
    }
    Strategy::NetworkFirst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> PrecacheManifest {
        let config = WorkerConfig::for_origin("https://blog.example")
            .with_precache(["/", "/offline.html", "/css/site.css"]);
        PrecacheManifest::from_config(&config).unwrap()
    }

    fn get(url: &str) -> Request {
        Request::get(url).unwrap()
    }

    #[test]
    fn test_non_get_bypasses() {
        let url = Url::parse("https://blog.example/").unwrap();
        for method in [Method::POST, Method::PUT, Method::DELETE, Method::HEAD] {
            let request = Request::new(method, url.clone());
            assert_eq!(classify(&manifest(), &request), Strategy::Bypass);
        }
    }

    #[test]
    fn test_non_http_bypasses() {
        let request =
            get("chrome-extension://abcdef/inject.js").with_destination(Destination::Font);
        assert_eq!(classify(&manifest(), &request), Strategy::Bypass);
    }

    #[test]
    fn test_destination_rules_precede_manifest() {
        let font = get("https://blog.example/css/site.css").with_destination(Destination::Font);
        assert_eq!(classify(&manifest(), &font), Strategy::CacheFirst);

        let image = get("https://blog.example/").with_destination(Destination::Image);
        assert_eq!(classify(&manifest(), &image), Strategy::StaleWhileRevalidate);
    }

    #[test]
    fn test_manifest_paths_are_cache_only() {
        assert_eq!(
            classify(&manifest(), &get("https://blog.example/")),
            Strategy::CacheOnly
        );
        assert_eq!(
            classify(&manifest(), &get("https://blog.example/css/site.css?v=3")),
            Strategy::CacheOnly
        );
        assert_eq!(
            classify(&manifest(), &get("https://blog.example/offline.html#top")),
            Strategy::CacheOnly
        );
    }

    #[test]
    fn test_cross_origin_path_is_not_precached() {
        assert_eq!(
            classify(&manifest(), &get("https://cdn.example/css/site.css")),
            Strategy::NetworkFirst
        );
    }

    #[test]
    fn test_everything_else_is_network_first() {
        let doc = get("https://blog.example/posts/hello").with_destination(Destination::Document);
        assert_eq!(classify(&manifest(), &doc), Strategy::NetworkFirst);
        let script = get("https://blog.example/app.js").with_destination(Destination::Script);
        assert_eq!(classify(&manifest(), &script), Strategy::NetworkFirst);
    }

    #[test]
    fn test_strategy_labels() {
        assert_eq!(Strategy::StaleWhileRevalidate.to_string(), "stale-while-revalidate");
        assert_eq!(
            serde_json::to_string(&Strategy::CacheOnly).unwrap(),
            "\"cache-only\""
        );
    }
}
