//! Event handlers a worker exposes to its host.

use super::lifecycle::{ActivateReport, InstallReport};
use super::messages::{
    ClientAction, FetchOutcome, MessageReply, Notification, SyncReport, WorkerMessage,
};
use crate::error::Result;
use crate::models::Request;
use async_trait::async_trait;
use std::sync::Arc;

/// Lifecycle, fetch and leaf event handlers.
///
/// A host delivers each event to exactly one handler call. Handlers that
/// return `Result` report failures the host must act on (a failed install
/// leaves the previous worker in charge, a failed sync is retried later).
#[async_trait]
pub trait WorkerHandlers: Send + Sync {
    /// Precache the manifest and request skip-waiting.
    async fn on_install(&self) -> Result<InstallReport>;

    /// Delete superseded namespaces and claim clients.
    async fn on_activate(&self) -> Result<ActivateReport>;

    /// Route one intercepted request.
    async fn on_fetch(&self, request: &Request) -> FetchOutcome;

    /// Handle a message posted by a controlled page.
    async fn on_message(&self, message: WorkerMessage) -> MessageReply;

    /// Build the notification for a push payload.
    fn on_push(&self, payload: Option<&str>) -> Notification;

    /// Decide what to do after a notification click.
    fn on_notification_click(&self, action: Option<&str>) -> ClientAction;

    /// Handle a background sync event.
    async fn on_sync(&self, tag: &str) -> Result<SyncReport>;
}

/// Shared handle to a handler implementation.
pub type DynWorkerHandlers = Arc<dyn WorkerHandlers>;
