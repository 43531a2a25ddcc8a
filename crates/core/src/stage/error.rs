//! Error types for external stages.

use thiserror::Error;

/// Errors reported by a partial processor or finalize stage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageError {
    /// The worker answered with a non-success status.
    #[error("stage rejected request: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The worker could not be reached.
    #[error("stage unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish in time.
    #[error("stage timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The stage ran and reported a failure.
    #[error("stage failed: {0}")]
    Failed(String),

    /// The worker answered with something that could not be decoded.
    #[error("invalid stage response: {0}")]
    InvalidResponse(String),
}

impl StageError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Client errors (4xx other than 408 and 429) and undecodable responses
    /// are not retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            StageError::Rejected { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            StageError::Unavailable(_) | StageError::Timeout { .. } | StageError::Failed(_) => true,
            StageError::InvalidResponse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StageError::Unavailable("refused".into()).is_retryable());
        assert!(StageError::Timeout { timeout_ms: 10 }.is_retryable());
        assert!(StageError::Rejected {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(StageError::Rejected {
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(!StageError::Rejected {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!StageError::InvalidResponse("eof".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = StageError::Rejected {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(
            err.to_string(),
            "stage rejected request: HTTP 502: bad gateway"
        );
    }
}
