//! Mock finalize stage for testing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::session::SessionContext;
use crate::stage::{FinalizeInput, FinalizeStage, StageError};

/// A recorded finalize call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFinalize {
    pub ctx: SessionContext,
    pub input: FinalizeInput,
    pub started_at: Instant,
}

/// Mock implementation of the FinalizeStage trait.
///
/// Outcomes are taken from a script, one per call. Once the script runs out
/// the stage returns the fallback error if one is set, otherwise
/// `{"status": "ok"}`.
#[derive(Debug)]
pub struct MockFinalizeStage {
    calls: Arc<RwLock<Vec<RecordedFinalize>>>,
    script: Arc<RwLock<VecDeque<Result<Value, StageError>>>>,
    fallback_error: Arc<RwLock<Option<StageError>>>,
    delay: Arc<RwLock<Duration>>,
}

impl Default for MockFinalizeStage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFinalizeStage {
    /// Create a new mock stage that succeeds immediately.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            script: Arc::new(RwLock::new(VecDeque::new())),
            fallback_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Queue the outcome of the next unscripted call.
    pub async fn push_outcome(&self, outcome: Result<Value, StageError>) {
        self.script.write().await.push_back(outcome);
    }

    /// Fail every call once the script is exhausted.
    pub async fn fail_always(&self, error: StageError) {
        *self.fallback_error.write().await = Some(error);
    }

    /// Set how long each call takes.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<RecordedFinalize> {
        self.calls.read().await.clone()
    }

    /// Get the number of calls made.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl FinalizeStage for MockFinalizeStage {
    fn name(&self) -> &str {
        "mock"
    }

    async fn finalize(
        &self,
        ctx: &SessionContext,
        input: FinalizeInput,
    ) -> Result<Value, StageError> {
        self.calls.write().await.push(RecordedFinalize {
            ctx: ctx.clone(),
            input,
            started_at: Instant::now(),
        });

        let delay = *self.delay.read().await;
        tokio::time::sleep(delay).await;

        if let Some(outcome) = self.script.write().await.pop_front() {
            return outcome;
        }
        match self.fallback_error.read().await.clone() {
            Some(error) => Err(error),
            None => Ok(json!({ "status": "ok" })),
        }
    }
}
