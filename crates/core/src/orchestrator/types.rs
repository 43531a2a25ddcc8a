//! Types for the session orchestrator.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::session::{BatchIndex, SessionState};

/// Errors returned by [`OrchestratorHandle`](super::OrchestratorHandle) calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// No session has been started.
    #[error("no active session")]
    NoActiveSession,

    /// The session already reached a terminal state.
    #[error("session is closed ({state})")]
    SessionClosed { state: SessionState },

    /// A finalize request is already outstanding for this generation.
    #[error("finalize already in progress")]
    FinalizeInProgress,

    /// The finalize request names more batches than the configured bound.
    #[error("last_index {last_index} exceeds the limit of {max}")]
    LastIndexTooLarge { last_index: BatchIndex, max: BatchIndex },

    /// Abort was called with nothing to abort.
    #[error("session is not active ({state})")]
    NotActive { state: SessionState },

    /// The orchestrator task has stopped.
    #[error("orchestrator is not running")]
    ActorUnavailable,

    /// The finalize request was accepted but did not succeed.
    #[error(transparent)]
    Finalize(#[from] FinalizeError),
}

/// Why an accepted finalize request did not produce an outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FinalizeError {
    /// The terminal handler failed on every allowed attempt.
    #[error("finalize failed after {attempts} attempt(s): {last_error}")]
    HandlerFailed { attempts: u32, last_error: String },

    /// The finalize budget ran out.
    #[error("finalize timed out after {attempts} attempt(s) in {elapsed_ms}ms: {last_error}")]
    TimedOut {
        attempts: u32,
        elapsed_ms: u64,
        last_error: String,
    },

    /// The session was aborted while finalize was outstanding.
    #[error("session aborted: {reason}")]
    Aborted { reason: String },

    /// A new session generation replaced this one.
    #[error("session superseded by a new consultation")]
    Superseded,

    /// The orchestrator shut down.
    #[error("orchestrator shut down")]
    Shutdown,
}

/// Result of an `enqueue_partial` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueAck {
    /// The batch was queued for dispatch.
    Accepted,
    /// The index was already seen; nothing changed.
    Duplicate,
}

impl EnqueueAck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, EnqueueAck::Accepted)
    }
}

/// Options for `start_consultation`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Resume after a front-end restart rather than start fresh.
    pub recovering: bool,
}

/// Successful result of the terminal step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizeOutcome {
    pub session_id: String,
    /// `Completed` or `Provisional`.
    pub state: SessionState,
    /// Whatever the finalize stage returned.
    pub result: Value,
    pub missing_batches: Vec<BatchIndex>,
    pub processed_batches: Vec<BatchIndex>,
    /// Terminal handler invocations, including the successful one.
    pub attempts: u32,
    /// Whether the readiness wait timed out before the terminal step ran.
    pub forced: bool,
}
