//! Centralized configuration for swcache.
//!
//! Constants live on unit structs grouped by concern. Everything a worker
//! instance needs (namespace names, precache manifest, offline document,
//! notification and sync settings) lives in [`WorkerConfig`], an immutable
//! value handed to [`Router::new`](crate::Router::new). Two routers built from
//! two configs share nothing.

use crate::error::{Result, SwError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "swcache";
    pub const USER_AGENT: &'static str = "swcache/0.2";
    pub const DEFAULT_DB_FILENAME: &'static str = "swcache.sqlite";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const QUICK_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
    pub const DEFAULT_ORIGIN: &'static str = "http://localhost/";
}

/// Names of the current cache namespaces, one per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Namespaces {
    /// App shell: precached pages, CSS, JS and fonts.
    pub static_assets: String,
    /// Pages and API responses cached by network-first.
    pub dynamic: String,
    /// Images cached by stale-while-revalidate.
    pub images: String,
}

impl Namespaces {
    /// Version-qualified names: `static-<v>`, `dynamic-<v>`, `images-<v>`.
    pub fn versioned(version: &str) -> Self {
        Self {
            static_assets: format!("static-{}", version),
            dynamic: format!("dynamic-{}", version),
            images: format!("images-{}", version),
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.static_assets, &self.dynamic, &self.images]
    }
}

/// Fixed option set for push notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct NotificationConfig {
    pub title: String,
    /// Body used when the push carries no payload.
    pub default_body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    /// URL opened when the notification is clicked.
    pub open_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "Blog Store Update".to_string(),
            default_body: "New update available!".to_string(),
            icon: "/images/icon-192x192.png".to_string(),
            badge: "/images/badge-72x72.png".to_string(),
            vibrate: vec![200, 100, 200],
            open_url: "/".to_string(),
        }
    }
}

/// Background sync settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SyncConfig {
    /// Sync tag that triggers a feed refresh.
    pub tag: String,
    /// Feed resource refetched on sync, stored under its own URL.
    pub feed_url: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tag: "sync-posts".to_string(),
            feed_url: "/feed.json".to_string(),
        }
    }
}

/// Immutable configuration of one worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Deployment version, reported by `GetVersion` messages.
    pub version: String,
    /// Origin the worker is registered for. Root-relative manifest entries
    /// are resolved against it and responses from it are `basic`.
    pub origin: String,
    pub namespaces: Namespaces,
    /// Extra namespaces activate must keep (e.g. a long-lived offline page).
    #[serde(default)]
    pub retain_namespaces: Vec<String>,
    /// Ordered list of URLs to precache at install.
    pub precache: Vec<String>,
    /// Document served to HTML requests that neither network nor cache can
    /// satisfy. Must be part of `precache`.
    pub offline_document: String,
    /// Refresh precached entries on a background task after serving them.
    #[serde(default)]
    pub revalidate_precached: bool,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            origin: NetworkConfig::DEFAULT_ORIGIN.to_string(),
            namespaces: Namespaces::versioned("v1"),
            retain_namespaces: Vec::new(),
            precache: vec!["/".to_string(), "/offline.html".to_string()],
            offline_document: "/offline.html".to_string(),
            revalidate_precached: false,
            notification: NotificationConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Default configuration for `origin`.
    pub fn for_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Set the deployment version and re-derive the namespace names from it.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self.namespaces = Namespaces::versioned(&self.version);
        self
    }

    pub fn with_namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn with_precache<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_offline_document(mut self, path: impl Into<String>) -> Self {
        self.offline_document = path.into();
        self
    }

    pub fn with_revalidate_precached(mut self, enabled: bool) -> Self {
        self.revalidate_precached = enabled;
        self
    }

    pub fn with_retained_namespace(mut self, name: impl Into<String>) -> Self {
        self.retain_namespaces.push(name.into());
        self
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| SwError::io_with_path(e, path))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed origin URL.
    pub fn origin_url(&self) -> Result<Url> {
        let url = Url::parse(&self.origin).map_err(|e| SwError::Validation {
            field: "origin".to_string(),
            message: format!("{}: {}", self.origin, e),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SwError::Validation {
                field: "origin".to_string(),
                message: format!("origin must be http(s), got {}", url.scheme()),
            });
        }
        Ok(url)
    }

    /// Resolve a root-relative or absolute URL against the origin.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        Ok(self.origin_url()?.join(url)?)
    }

    /// Namespaces that survive activation.
    pub fn current_namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let candidates = self
            .namespaces
            .all()
            .into_iter()
            .map(str::to_string)
            .chain(self.retain_namespaces.iter().cloned());
        for name in candidates {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Check the configuration is usable.
    ///
    /// The manifest must contain the site root and the offline document, and
    /// every namespace name must be non-empty.
    pub fn validate(&self) -> Result<()> {
        let origin = self.origin_url()?;

        for name in self.namespaces.all() {
            if name.trim().is_empty() {
                return Err(SwError::Validation {
                    field: "namespaces".to_string(),
                    message: "namespace names must not be empty".to_string(),
                });
            }
        }

        let manifest = self
            .precache
            .iter()
            .map(|u| self.resolve(u))
            .collect::<Result<Vec<_>>>()?;

        let root = origin.join("/")?;
        if !manifest.iter().any(|u| same_resource(u, &root)) {
            return Err(SwError::Validation {
                field: "precache".to_string(),
                message: "manifest must include the site root".to_string(),
            });
        }

        let offline = self.resolve(&self.offline_document)?;
        if !manifest.iter().any(|u| same_resource(u, &offline)) {
            return Err(SwError::Validation {
                field: "precache".to_string(),
                message: format!(
                    "manifest must include the offline document {}",
                    self.offline_document
                ),
            });
        }

        Ok(())
    }
}

/// Same origin and path, ignoring query and fragment.
pub(crate) fn same_resource(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin() && a.path() == b.path()
}
