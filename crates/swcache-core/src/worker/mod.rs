//! The worker: request routing, lifecycle and leaf event handlers.
//!
//! This module provides:
//! - `classify`, the pure request → strategy mapping
//! - `Router`, which executes the strategies over a store and a fetcher
//! - `WorkerHandlers`, the event surface a host drives
//! - `BackgroundTasks`, the tracker for detached revalidation work

mod background;
mod handlers;
mod lifecycle;
mod messages;
mod router;
mod strategy;

pub use background::BackgroundTasks;
pub use handlers::{DynWorkerHandlers, WorkerHandlers};
pub use lifecycle::{ActivateReport, InstallReport, WorkerState};
pub use messages::{
    ClientAction, FetchOutcome, MessageReply, Notification, NotificationAction, NotificationData,
    SyncReport, WorkerMessage,
};
pub use router::Router;
pub use strategy::{classify, PrecacheManifest, Strategy};
