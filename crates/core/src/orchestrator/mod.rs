//! Session orchestrator.
//!
//! Coordinates one consultation session at a time:
//! - **Dispatch**: bounded-concurrency partial processing, results in any order
//! - **Finalize**: waits for quiescence (or forces after a timeout), then runs
//!   the terminal step with retries inside a time budget
//! - **Status**: every mutation is published as an immutable snapshot

mod config;
mod finalize;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::{OrchestratorHandle, PendingFinalize, SessionOrchestrator, StatusCallback};
pub use types::{EnqueueAck, FinalizeError, FinalizeOutcome, OrchestratorError, StartOptions};
