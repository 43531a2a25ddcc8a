//! Status snapshot recorder.

use std::sync::{Arc, Mutex};

use crate::orchestrator::StatusCallback;
use crate::session::{SessionState, StatusSnapshot};

/// Collects every snapshot the orchestrator publishes.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    snapshots: Arc<Mutex<Vec<StatusSnapshot>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that appends to this observer.
    pub fn callback(&self) -> StatusCallback {
        let snapshots = Arc::clone(&self.snapshots);
        Arc::new(move |snapshot: &StatusSnapshot| {
            snapshots
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(snapshot.clone());
        })
    }

    /// All snapshots so far, oldest first.
    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Distinct consecutive states, oldest first.
    pub fn states(&self) -> Vec<SessionState> {
        let mut states: Vec<SessionState> = self.snapshots().iter().map(|s| s.state).collect();
        states.dedup();
        states
    }

    pub fn last(&self) -> Option<StatusSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}
