//! Bookkeeping for the single outstanding finalize request.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::error;

use super::types::{FinalizeError, FinalizeOutcome};
use crate::session::{BatchIndex, FinalizeProgress, Payload, WorkLedger};

pub(crate) type FinalizeReply = oneshot::Sender<Result<FinalizeOutcome, FinalizeError>>;

/// Where the request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinalizePhase {
    /// Waiting for the ledger to go quiescent; re-check at the given instant.
    Waiting { recheck_at: Instant },
    /// A terminal attempt is in flight.
    Running,
    /// The last attempt failed; the next one may start at `until`.
    Backoff { until: Instant },
}

/// Result of a readiness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// Every expected batch is accounted for and nothing is outstanding.
    Ready,
    /// The wait deadline passed; run anyway without these batches.
    Forced { outstanding: Vec<BatchIndex> },
    /// Check again at `until`.
    Wait { until: Instant },
}

pub(crate) struct FinalizeRequest {
    pub last_index: BatchIndex,
    pub payload: Payload,
    pub requested_at: DateTime<Utc>,
    /// When the request arrived; both the readiness wait and the retry
    /// budget are measured from here.
    pub received: Instant,
    pub attempts: u32,
    pub forced: bool,
    pub phase: FinalizePhase,
    pub last_error: Option<String>,
    reply: Option<FinalizeReply>,
}

impl FinalizeRequest {
    pub fn new(last_index: BatchIndex, payload: Payload, reply: FinalizeReply) -> Self {
        let now = Instant::now();
        Self {
            last_index,
            payload,
            requested_at: Utc::now(),
            received: now,
            attempts: 0,
            forced: false,
            phase: FinalizePhase::Waiting { recheck_at: now },
            last_error: None,
            reply: Some(reply),
        }
    }

    /// Decide whether the terminal step may run now.
    pub fn readiness(
        &self,
        ledger: &WorkLedger,
        now: Instant,
        wait: Duration,
        poll: Duration,
    ) -> Readiness {
        if ledger.is_quiescent() && ledger.all_seen(self.last_index) {
            return Readiness::Ready;
        }

        let deadline = self.received + wait;
        if now >= deadline {
            let mut outstanding = ledger.unaccounted(self.last_index);
            outstanding.extend(ledger.pending());
            outstanding.extend(ledger.in_flight());
            outstanding.sort_unstable();
            return Readiness::Forced { outstanding };
        }

        Readiness::Wait {
            until: (now + poll).min(deadline),
        }
    }

    /// Time spent against the retry budget.
    pub fn budget_elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received)
    }

    pub fn remaining_budget(&self, now: Instant, budget: Duration) -> Duration {
        budget.saturating_sub(self.budget_elapsed(now))
    }

    pub fn budget_exhausted(&self, now: Instant, budget: Duration) -> bool {
        self.remaining_budget(now, budget).is_zero()
    }

    /// Timeout for the attempt about to launch.
    ///
    /// Retries get whatever budget remains. The first attempt always runs, so
    /// when the wait already used up the budget it gets a full budget of its
    /// own instead.
    pub fn attempt_cap(&self, now: Instant, budget: Duration) -> Duration {
        let remaining = self.remaining_budget(now, budget);
        if self.attempts <= 1 && remaining.is_zero() {
            budget
        } else {
            remaining
        }
    }

    pub fn progress(&self) -> FinalizeProgress {
        FinalizeProgress {
            last_index: self.last_index,
            attempts: self.attempts,
            requested_at: self.requested_at,
            forced: self.forced,
        }
    }

    /// Deliver the result to the caller. Only the first call has any effect.
    pub fn resolve(&mut self, result: Result<FinalizeOutcome, FinalizeError>) {
        let Some(reply) = self.reply.take() else {
            return;
        };
        if reply.send(result).is_err() {
            error!(
                last_index = self.last_index,
                "Finalize result could not be delivered; caller went away"
            );
        }
    }
}
