//! In-process cache store.

use super::traits::{CacheStore, NamespaceMeta, StoreStats, StoredResponse};
use crate::error::Result;
use crate::models::{RequestKey, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Partition {
    name: String,
    entries: HashMap<RequestKey, StoredResponse>,
}

/// Cache store kept entirely in memory.
///
/// Namespaces are kept in creation order so `keys()` and `match_any()` behave
/// like the browser's cache storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    partitions: RwLock<Vec<Partition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn partition_mut<'a>(partitions: &'a mut Vec<Partition>, namespace: &str) -> &'a mut Partition {
    let index = match partitions.iter().position(|p| p.name == namespace) {
        Some(index) => index,
        None => {
            debug!("Creating cache namespace '{}'", namespace);
            partitions.push(Partition {
                name: namespace.to_string(),
                entries: HashMap::new(),
            });
            partitions.len() - 1
        }
    };
    &mut partitions[index]
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, namespace: &str) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        partition_mut(&mut partitions, namespace);
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &RequestKey) -> Result<Option<StoredResponse>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|p| p.name == namespace)
            .and_then(|p| p.entries.get(key))
            .cloned())
    }

    async fn put(&self, namespace: &str, key: &RequestKey, response: &Response) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        partition_mut(&mut partitions, namespace)
            .entries
            .insert(key.clone(), StoredResponse::new(response.clone()));
        Ok(())
    }

    async fn put_all(&self, namespace: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
        // A single write guard makes the batch atomic for readers.
        let mut partitions = self.partitions.write().await;
        let partition = partition_mut(&mut partitions, namespace);
        for (key, response) in entries {
            partition
                .entries
                .insert(key.clone(), StoredResponse::new(response.clone()));
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().map(|p| p.name.clone()).collect())
    }

    async fn has_namespace(&self, namespace: &str) -> Result<bool> {
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().any(|p| p.name == namespace))
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        let mut partitions = self.partitions.write().await;
        let before = partitions.len();
        partitions.retain(|p| p.name != namespace);
        Ok(partitions.len() != before)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let partitions = self.partitions.read().await;
        let namespaces = partitions
            .iter()
            .map(|p| NamespaceMeta {
                namespace: p.name.clone(),
                entry_count: p.entries.len(),
                total_size_bytes: p
                    .entries
                    .values()
                    .map(|e| e.response.body.len() as u64)
                    .sum(),
            })
            .collect();
        Ok(StoreStats::from_namespaces(namespaces))
    }
}
