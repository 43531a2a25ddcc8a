//! Session identity, lifecycle state and the externally visible snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of one batch within a session.
pub type BatchIndex = u32;

/// Opaque payload carried by partial and finalize requests.
pub type Payload = serde_json::Value;

/// Lifecycle state of a consultation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session has been started yet.
    Idle,
    /// Fresh session, waiting for the first batch.
    Recording,
    /// Session resumed after a front-end restart, waiting for batches.
    Recovering,
    /// Partial batches are queued, in flight, or finalize is waiting on them.
    ProcessingPartials,
    /// A terminal handler attempt is in flight.
    Finalizing,
    /// Finalized with every expected batch accounted for.
    Completed,
    /// Finalized with some batches missing.
    Provisional,
    /// Finalize gave up, or the session was aborted.
    Failed,
}

impl SessionState {
    /// Returns the snake_case name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Recovering => "recovering",
            SessionState::ProcessingPartials => "processing_partials",
            SessionState::Finalizing => "finalizing",
            SessionState::Completed => "completed",
            SessionState::Provisional => "provisional",
            SessionState::Failed => "failed",
        }
    }

    /// Whether the session has reached one of its three end shapes.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Provisional | SessionState::Failed
        )
    }

    /// All states, in lifecycle order.
    pub fn all() -> &'static [SessionState] {
        &[
            SessionState::Idle,
            SessionState::Recording,
            SessionState::Recovering,
            SessionState::ProcessingPartials,
            SessionState::Finalizing,
            SessionState::Completed,
            SessionState::Provisional,
            SessionState::Failed,
        ]
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and lifecycle of one session generation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub participant: String,
    pub generation: u64,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: String, participant: String, generation: u64, recovering: bool) -> Self {
        let now = Utc::now();
        Self {
            id,
            participant,
            generation,
            state: if recovering {
                SessionState::Recovering
            } else {
                SessionState::Recording
            },
            started_at: now,
            updated_at: now,
        }
    }

    /// Moves to `state` and bumps `updated_at`.
    pub fn transition(&mut self, state: SessionState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// Records a mutation without changing state.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Context handed to external stages.
    pub fn context(&self) -> SessionContext {
        SessionContext {
            session_id: self.id.clone(),
            participant: self.participant.clone(),
            generation: self.generation,
        }
    }
}

/// What external stages learn about the session they are working for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub participant: String,
    /// Generation the call was issued under. Callers persisting results should
    /// compare it against the current generation before writing.
    pub generation: u64,
}

/// Progress of the outstanding finalize request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeProgress {
    /// Exclusive upper bound of expected batch indices.
    pub last_index: BatchIndex,
    /// Terminal handler attempts started so far.
    pub attempts: u32,
    pub requested_at: DateTime<Utc>,
    /// Whether the readiness wait timed out and finalize was forced.
    pub forced: bool,
}

/// Immutable, point-in-time view of the session and its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub session_id: Option<String>,
    pub participant: Option<String>,
    pub generation: u64,
    pub state: SessionState,
    pub processed: Vec<BatchIndex>,
    pub pending: Vec<BatchIndex>,
    pub in_flight: Vec<BatchIndex>,
    pub lowest_unprocessed: BatchIndex,
    pub missing: Vec<BatchIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalize: Option<FinalizeProgress>,
    pub updated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Snapshot of an orchestrator that has never started a session.
    pub fn idle() -> Self {
        Self {
            session_id: None,
            participant: None,
            generation: 0,
            state: SessionState::Idle,
            processed: Vec::new(),
            pending: Vec::new(),
            in_flight: Vec::new(),
            lowest_unprocessed: 0,
            missing: Vec::new(),
            reason: None,
            finalize: None,
            updated_at: Utc::now(),
        }
    }
}
