//! Worker lifecycle state.

use crate::error::{Result, SwError};
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle states of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Created, install not yet attempted.
    Parsed = 0,
    /// Install handler running.
    Installing = 1,
    /// Precache complete, waiting to activate.
    Installed = 2,
    /// Activate handler running.
    Activating = 3,
    /// Active and controlling clients.
    Activated = 4,
    /// Install failed; this worker will never activate.
    Redundant = 5,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Parsed => write!(f, "parsed"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Activated => write!(f, "activated"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => WorkerState::Parsed,
            1 => WorkerState::Installing,
            2 => WorkerState::Installed,
            3 => WorkerState::Activating,
            4 => WorkerState::Activated,
            _ => WorkerState::Redundant,
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Redundant, Installing)
                | (Installing, Installed)
                | (Installing, Redundant)
                | (Installed, Installing)
                | (Installed, Activating)
                | (Activated, Installing)
                | (Activating, Activated)
                | (Activating, Installed)
        )
    }
}

/// Atomic holder for the worker state.
#[derive(Debug)]
pub(crate) struct AtomicWorkerState(AtomicU8);

impl AtomicWorkerState {
    pub(crate) fn new(state: WorkerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move to `next` if the transition is legal from the current state.
    pub(crate) fn transition(&self, next: WorkerState) -> Result<WorkerState> {
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            let from = WorkerState::from_u8(current);
            if !from.can_transition_to(next) {
                return Err(SwError::InvalidState {
                    from: from.to_string(),
                    to: next.to_string(),
                });
            }
            match self.0.compare_exchange(
                current,
                next as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(from),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// Namespace the manifest was written into.
    pub namespace: String,
    /// Number of precached resources.
    pub precached: usize,
    /// The worker asks to take over without waiting for old clients.
    pub skip_waiting: bool,
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    /// Superseded namespaces that were deleted.
    pub deleted: Vec<String>,
    /// The worker claimed all open clients.
    pub claimed: bool,
}
