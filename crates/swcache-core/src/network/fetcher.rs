//! Network fetcher trait.

use crate::error::Result;
use crate::models::{Request, Response};
use async_trait::async_trait;
use std::sync::Arc;

/// Issues requests on behalf of the router.
///
/// A returned `Ok` means the network produced a response, whatever its
/// status. `Err` means no response at all (DNS, connection, timeout, abort).
/// Timeouts are the implementation's concern; the router never imposes one.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Shared handle to a fetcher implementation.
pub type DynFetcher = Arc<dyn Fetcher>;
