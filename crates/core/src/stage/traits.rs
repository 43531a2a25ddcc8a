//! Trait definitions for external stages.

use async_trait::async_trait;
use serde_json::Value;

use super::error::StageError;
use super::types::FinalizeInput;
use crate::session::{BatchIndex, Payload, SessionContext};

/// Processes one partial batch.
///
/// Failures are recorded against the batch and never retried.
#[async_trait]
pub trait PartialProcessor: Send + Sync {
    /// Returns the name of this processor implementation.
    fn name(&self) -> &str;

    /// Processes the batch at `index`.
    async fn process_partial(
        &self,
        ctx: &SessionContext,
        index: BatchIndex,
        payload: Payload,
    ) -> Result<(), StageError>;
}

/// Runs the terminal aggregation step for a session.
#[async_trait]
pub trait FinalizeStage: Send + Sync {
    /// Returns the name of this stage implementation.
    fn name(&self) -> &str;

    /// Aggregates the session. May be called more than once on failure.
    async fn finalize(&self, ctx: &SessionContext, input: FinalizeInput)
        -> Result<Value, StageError>;
}
