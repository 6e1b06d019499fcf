//! Cache store trait and types.

use crate::error::Result;
use crate::models::{RequestKey, Response};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A response snapshot held by a namespace.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub response: Response,
    /// When the entry was written. Informational only; entries never expire.
    pub cached_at: DateTime<Utc>,
}

impl StoredResponse {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            cached_at: Utc::now(),
        }
    }
}

/// Metadata about a cache namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceMeta {
    /// Namespace name.
    pub namespace: String,
    /// Number of entries in this namespace.
    pub entry_count: usize,
    /// Total body size of all entries in bytes.
    pub total_size_bytes: u64,
}

/// Statistics across all namespaces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    /// Per-namespace statistics, in creation order.
    pub namespaces: Vec<NamespaceMeta>,
}

impl StoreStats {
    pub fn from_namespaces(namespaces: Vec<NamespaceMeta>) -> Self {
        Self {
            total_entries: namespaces.iter().map(|n| n.entry_count).sum(),
            total_size_bytes: namespaces.iter().map(|n| n.total_size_bytes).sum(),
            namespaces,
        }
    }
}

/// Namespace-partitioned response store, keyed by request identity.
///
/// Implementations must tolerate concurrent reads and writes. There is no
/// cross-entry transaction except [`put_all`](CacheStore::put_all), which is
/// all-or-nothing.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the namespace if it does not exist yet.
    async fn open(&self, namespace: &str) -> Result<()>;

    /// Look up an entry in one namespace.
    async fn get(&self, namespace: &str, key: &RequestKey) -> Result<Option<StoredResponse>>;

    /// Store an entry, creating the namespace if needed.
    ///
    /// Overwrites any existing entry with the same key.
    async fn put(&self, namespace: &str, key: &RequestKey, response: &Response) -> Result<()>;

    /// Store several entries atomically: either all are written or none.
    async fn put_all(&self, namespace: &str, entries: &[(RequestKey, Response)]) -> Result<()>;

    /// Names of all namespaces, in creation order.
    async fn keys(&self) -> Result<Vec<String>>;

    async fn has_namespace(&self, namespace: &str) -> Result<bool>;

    /// Delete a namespace and every entry in it.
    ///
    /// Returns whether the namespace existed.
    async fn delete_namespace(&self, namespace: &str) -> Result<bool>;

    /// Per-namespace entry counts and sizes.
    async fn stats(&self) -> Result<StoreStats>;

    /// Look up an entry in every namespace, oldest namespace first.
    async fn match_any(&self, key: &RequestKey) -> Result<Option<StoredResponse>> {
        for namespace in self.keys().await? {
            if let Some(found) = self.get(&namespace, key).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

/// Shared handle to a store implementation.
pub type DynCacheStore = Arc<dyn CacheStore>;
