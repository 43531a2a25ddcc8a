//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the session orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum partial batches in flight at once.
    #[serde(default = "default_max_concurrent_partials")]
    pub max_concurrent_partials: usize,

    /// How long finalize waits for outstanding batches before forcing the
    /// terminal step (milliseconds, measured from the request).
    #[serde(default = "default_finalize_wait")]
    pub finalize_wait_ms: u64,

    /// Additional terminal attempts after the first failure.
    #[serde(default = "default_max_finalize_retries")]
    pub max_finalize_retries: u32,

    /// Total time the terminal step may take across all attempts
    /// (milliseconds, measured from the request).
    #[serde(default = "default_finalize_budget")]
    pub finalize_budget_ms: u64,

    /// Delay between a failed terminal attempt and the next (milliseconds).
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// How often an unready finalize request re-checks readiness (milliseconds).
    #[serde(default = "default_readiness_poll")]
    pub readiness_poll_ms: u64,

    /// Largest `last_index` a finalize request may name.
    #[serde(default = "default_max_last_index")]
    pub max_last_index: u32,
}

fn default_max_concurrent_partials() -> usize {
    4
}

fn default_finalize_wait() -> u64 {
    180_000 // 3 minutes
}

fn default_max_finalize_retries() -> u32 {
    2
}

fn default_finalize_budget() -> u64 {
    120_000 // 2 minutes
}

fn default_retry_backoff() -> u64 {
    3_000
}

fn default_readiness_poll() -> u64 {
    250
}

fn default_max_last_index() -> u32 {
    100_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_partials: default_max_concurrent_partials(),
            finalize_wait_ms: default_finalize_wait(),
            max_finalize_retries: default_max_finalize_retries(),
            finalize_budget_ms: default_finalize_budget(),
            retry_backoff_ms: default_retry_backoff(),
            readiness_poll_ms: default_readiness_poll(),
            max_last_index: default_max_last_index(),
        }
    }
}

impl OrchestratorConfig {
    pub fn finalize_wait(&self) -> Duration {
        Duration::from_millis(self.finalize_wait_ms)
    }

    pub fn finalize_budget(&self) -> Duration {
        Duration::from_millis(self.finalize_budget_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }
}
