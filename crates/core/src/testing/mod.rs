//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the stage traits and a
//! snapshot recorder, so the orchestrator can be exercised without worker
//! services.
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_core::testing::{fixtures, MockFinalizeStage, MockPartialProcessor};
//!
//! let processor = Arc::new(MockPartialProcessor::new());
//! let finalizer = Arc::new(MockFinalizeStage::new());
//! let (handle, observer) =
//!     fixtures::spawn_orchestrator(OrchestratorConfig::default(), &processor, &finalizer);
//!
//! handle.start_consultation("s-1", "Dr. Lee", StartOptions::default()).await?;
//! handle.enqueue_partial(0, fixtures::payload(0)).await?;
//! let outcome = handle.finalize(1, fixtures::payload(99)).await?;
//! ```

mod mock_finalize;
mod mock_partial;
mod observer;

pub use mock_finalize::{MockFinalizeStage, RecordedFinalize};
pub use mock_partial::{MockPartialProcessor, RecordedPartial};
pub use observer::RecordingObserver;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Value};
    use std::sync::Arc;

    use super::{MockFinalizeStage, MockPartialProcessor, RecordingObserver};
    use crate::orchestrator::{OrchestratorConfig, OrchestratorHandle, SessionOrchestrator};
    use crate::session::BatchIndex;

    /// A recognisable payload for batch `index`.
    pub fn payload(index: BatchIndex) -> Value {
        json!({ "batch": index, "audio": format!("chunk-{}.webm", index) })
    }

    /// Default configuration with a different concurrency limit.
    pub fn config_with_limit(limit: usize) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrent_partials: limit,
            ..OrchestratorConfig::default()
        }
    }

    /// Spawn an orchestrator over the given mocks with a recording observer.
    pub fn spawn_orchestrator(
        config: OrchestratorConfig,
        processor: &Arc<MockPartialProcessor>,
        finalizer: &Arc<MockFinalizeStage>,
    ) -> (OrchestratorHandle, RecordingObserver) {
        let observer = RecordingObserver::new();
        let handle = SessionOrchestrator::new(
            config,
            Arc::clone(processor) as _,
            Arc::clone(finalizer) as _,
        )
        .with_status_callback(observer.callback())
        .spawn();
        (handle, observer)
    }
}
