use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::WorkoutTemplate;
use crate::store::KeyValueStore;

const PENDING_RESUME_KEY: &str = "pending_resume";

/// Snapshot of a minimized workout: enough to rebuild the session later with
/// its original start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWorkout {
    pub template: WorkoutTemplate,
    pub start_time: DateTime<Local>,
}

/// The single "pending resume" slot shared by all commands. Storage failures
/// are logged and swallowed; an unreadable slot reads as empty.
pub struct PendingResumeSlot {
    store: Arc<dyn KeyValueStore>,
}

impl PendingResumeSlot {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Place a minimized workout in the slot, replacing any previous one.
    pub async fn show(&self, pending: &PendingWorkout) {
        let encoded = match serde_json::to_string(pending) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!("could not encode minimized workout: {err}");
                return;
            }
        };
        if let Err(err) = self.store.set(PENDING_RESUME_KEY, &encoded).await {
            warn!("could not persist minimized workout: {err}");
        }
    }

    pub async fn peek(&self) -> Option<PendingWorkout> {
        let raw = match self.store.get(PENDING_RESUME_KEY).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!("could not read minimized workout: {err}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(pending) => Some(pending),
            Err(err) => {
                warn!("discarding unreadable minimized workout: {err}");
                None
            }
        }
    }

    /// Empty the slot after the workout has been taken back by a screen.
    pub async fn hide(&self) {
        if let Err(err) = self.store.remove(PENDING_RESUME_KEY).await {
            warn!("could not clear minimized workout: {err}");
        }
    }

    /// Empty the slot because the workout was abandoned.
    pub async fn discard(&self) {
        self.hide().await;
    }
}
