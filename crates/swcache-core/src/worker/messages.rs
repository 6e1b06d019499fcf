//! Values exchanged between the worker and its host.

use super::lifecycle::WorkerState;
use crate::error::{Result, SwError};
use crate::models::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of routing one intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not intercepted; the host performs its default network handling.
    Bypass,
    /// The worker answered. `None` is the empty response a cache-only miss
    /// or an unrecoverable non-document failure resolves to.
    Respond(Option<Response>),
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Respond(Some(response)) => Some(response),
            _ => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchOutcome::Respond(response) => response,
            FetchOutcome::Bypass => None,
        }
    }

    pub fn is_bypass(&self) -> bool {
        matches!(self, FetchOutcome::Bypass)
    }
}

/// Commands a controlled page can post to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Take over without waiting for existing clients to close.
    SkipWaiting,
    /// Take control of every open client now.
    ClaimClients,
    /// Ask for the deployed version.
    GetVersion,
}

impl WorkerMessage {
    /// Parse a posted message.
    ///
    /// Accepts the tagged JSON form (`{"type":"SKIP_WAITING"}`) as well as the
    /// bare strings pages commonly post (`"skipWaiting"`).
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if let Ok(message) = serde_json::from_str::<WorkerMessage>(trimmed) {
            return Ok(message);
        }

        let bare = match serde_json::from_str::<String>(trimmed) {
            Ok(s) => s,
            Err(_) => trimmed.to_string(),
        };
        match bare.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "skipwaiting" => Ok(WorkerMessage::SkipWaiting),
            "claimclients" | "claim" => Ok(WorkerMessage::ClaimClients),
            "getversion" | "version" => Ok(WorkerMessage::GetVersion),
            _ => Err(SwError::Validation {
                field: "message".to_string(),
                message: format!("unknown worker message: {}", trimmed),
            }),
        }
    }
}

/// Reply to a [`WorkerMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageReply {
    SkipWaiting { state: WorkerState },
    Claimed,
    Version { version: String },
}

/// An action button on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Payload attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub date_of_arrival: DateTime<Utc>,
    pub primary_key: u32,
}

/// A notification the host should display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

/// What the host should do after a notification click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientAction {
    /// Close the notification, nothing else.
    Close,
    /// Close the notification and focus a client at `url`, opening one if
    /// none exists.
    FocusOrOpen { url: String },
}

/// Result of a background sync event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncReport {
    /// The feed was refetched and stored.
    Refreshed { key: String, bytes: usize },
    /// The tag is not one this worker handles.
    Ignored { tag: String },
}
