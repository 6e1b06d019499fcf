//! Detached background work.
//!
//! Revalidation fetches and the cache writes that follow them run on their
//! own tokio tasks so the response path never waits for them. Every error is
//! caught at the task boundary: an `Err` from the task body, a panic, or an
//! abort is logged and dropped. Hosts that need to know when the work has
//! settled (graceful shutdown, tests) call [`BackgroundTasks::wait_idle`].

use crate::error::Result;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tracing::debug;

/// Tracker for fire-and-forget tasks.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    tasks: Mutex<JoinSet<()>>,
    spawned: AtomicU64,
    failed: AtomicU64,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` on a detached task.
    ///
    /// The caller is never told how it went; failures only reach the log.
    pub fn spawn<F>(self: &std::sync::Arc<Self>, label: impl Into<String>, work: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let label = label.into();
        let tracker = self.clone();
        self.spawned.fetch_add(1, Ordering::SeqCst);

        let task = async move {
            if let Err(e) = work.await {
                tracker.failed.fetch_add(1, Ordering::SeqCst);
                debug!("Background task '{}' failed: {}", label, e);
            }
        };

        match self.tasks.lock() {
            Ok(mut tasks) => {
                // Reap finished tasks so a panic is counted even if nobody waits.
                while let Some(joined) = tasks.try_join_next() {
                    if let Err(e) = joined {
                        self.record_abnormal(e);
                    }
                }
                tasks.spawn(task);
            }
            Err(_) => {
                tokio::spawn(task);
            }
        }
    }

    fn record_abnormal(&self, err: JoinError) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        debug!("Background task ended abnormally: {}", err);
    }

    /// Number of tracked tasks not yet reaped.
    pub fn pending(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    /// Total tasks spawned since creation.
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Tasks whose body returned an error, panicked or was aborted.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Wait until every tracked task has finished, including tasks spawned
    /// while waiting.
    pub async fn wait_idle(&self) {
        loop {
            let mut drained = match self.tasks.lock() {
                Ok(mut tasks) => std::mem::take(&mut *tasks),
                Err(_) => return,
            };
            if drained.is_empty() {
                return;
            }
            while let Some(joined) = drained.join_next().await {
                if let Err(e) = joined {
                    self.record_abnormal(e);
                }
            }
        }
    }

    /// Abort every pending task.
    ///
    /// Writes tied to aborted tasks simply never happen.
    pub fn abort_all(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.abort_all();
        }
    }
}
