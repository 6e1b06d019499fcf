//! Cache store abstraction for swcache.
//!
//! A store is a set of named namespaces, each mapping request identities to
//! response snapshots. Two implementations are provided:
//! - `MemoryStore` for tests and short-lived hosts
//! - `SqliteStore` for hosts that keep their caches across restarts

mod handle;
mod memory;
mod sqlite;
mod traits;

pub use handle::CacheHandle;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CacheStore, DynCacheStore, NamespaceMeta, StoreStats, StoredResponse};
