use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker endpoints for the HTTP-backed stages.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagesConfig {
    /// URL receiving one POST per partial batch.
    #[serde(default)]
    pub partial_url: Option<String>,
    /// URL receiving the finalize POST.
    #[serde(default)]
    pub finalize_url: Option<String>,
    /// Per-request timeout in seconds (default: 300)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            partial_url: None,
            finalize_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

impl StagesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
