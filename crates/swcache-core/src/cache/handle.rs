//! Namespace handle: a store plus the name of one namespace.

use super::traits::{DynCacheStore, StoredResponse};
use crate::error::{Result, SwError};
use crate::models::{Method, Request, RequestKey, Response};
use crate::network::Fetcher;
use futures::future::try_join_all;
use tracing::{debug, info};
use url::Url;

/// Handle on one namespace of a cache store.
#[derive(Clone)]
pub struct CacheHandle {
    store: DynCacheStore,
    name: String,
}

impl CacheHandle {
    pub fn new(store: DynCacheStore, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an entry with its insertion time.
    pub async fn match_entry(&self, key: &RequestKey) -> Result<Option<StoredResponse>> {
        self.store.get(&self.name, key).await
    }

    /// Store a response for a request, overwriting any previous entry.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<()> {
        self.store.put(&self.name, &request.key(), response).await
    }

    /// Store a response under an explicit key.
    pub async fn put_key(&self, key: &RequestKey, response: &Response) -> Result<()> {
        self.store.put(&self.name, key, response).await
    }

    /// Fetch every URL and store all responses, or store nothing.
    ///
    /// Any network failure or non-2xx status aborts the whole batch with
    /// [`SwError::InstallFailed`] before a single entry is written.
    pub async fn add_all(&self, fetcher: &dyn Fetcher, urls: &[Url]) -> Result<usize> {
        let fetches = urls.iter().map(|url| async move {
            let request = Request::new(Method::GET, url.clone());
            let response = fetcher
                .fetch(&request)
                .await
                .map_err(|e| SwError::InstallFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

            if !response.is_ok() {
                return Err(SwError::InstallFailed {
                    url: url.to_string(),
                    message: format!("status {}", response.status),
                });
            }

            debug!("Fetched {} for precache", url);
            Ok((request.key(), response))
        });

        let entries = try_join_all(fetches).await?;
        self.store.put_all(&self.name, &entries).await?;

        info!("Precached {} resources into '{}'", entries.len(), self.name);
        Ok(entries.len())
    }
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle").field("name", &self.name).finish()
    }
}
