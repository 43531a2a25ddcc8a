//! Mock partial processor for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::session::{BatchIndex, Payload, SessionContext};
use crate::stage::{PartialProcessor, StageError};

/// A recorded partial call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedPartial {
    pub index: BatchIndex,
    pub generation: u64,
    pub payload: Payload,
    /// When the call started (tokio clock, so paused-time tests can compare).
    pub started_at: Instant,
}

/// Mock implementation of the PartialProcessor trait.
///
/// Provides controllable behavior for testing:
/// - Per-index or default processing delay
/// - Per-index failures and hangs
/// - Recorded calls and the concurrency high-water mark
///
/// # Example
///
/// ```rust,ignore
/// use cadence_core::testing::MockPartialProcessor;
///
/// let processor = Arc::new(MockPartialProcessor::new());
/// processor.set_delay(2, Duration::from_secs(5)).await;
/// processor.fail(3).await;
/// processor.hang(4).await;
///
/// // ... drive the orchestrator ...
///
/// assert_eq!(processor.max_in_flight(), 2);
/// ```
#[derive(Debug)]
pub struct MockPartialProcessor {
    calls: Arc<RwLock<Vec<RecordedPartial>>>,
    delays: Arc<RwLock<HashMap<BatchIndex, Duration>>>,
    default_delay: Arc<RwLock<Duration>>,
    failing: Arc<RwLock<HashSet<BatchIndex>>>,
    hanging: Arc<RwLock<HashSet<BatchIndex>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockPartialProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPartialProcessor {
    /// Create a new mock processor that succeeds after 100ms.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            delays: Arc::new(RwLock::new(HashMap::new())),
            default_delay: Arc::new(RwLock::new(Duration::from_millis(100))),
            failing: Arc::new(RwLock::new(HashSet::new())),
            hanging: Arc::new(RwLock::new(HashSet::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the processing delay for one index.
    pub async fn set_delay(&self, index: BatchIndex, delay: Duration) {
        self.delays.write().await.insert(index, delay);
    }

    /// Set the processing delay for indices without their own.
    pub async fn set_default_delay(&self, delay: Duration) {
        *self.default_delay.write().await = delay;
    }

    /// Make the batch at `index` fail after its delay.
    pub async fn fail(&self, index: BatchIndex) {
        self.failing.write().await.insert(index);
    }

    /// Make the batch at `index` never complete.
    pub async fn hang(&self, index: BatchIndex) {
        self.hanging.write().await.insert(index);
    }

    /// Get all recorded calls, in start order.
    pub async fn recorded_calls(&self) -> Vec<RecordedPartial> {
        self.calls.read().await.clone()
    }

    /// Indices in the order their calls started.
    pub async fn started_indices(&self) -> Vec<BatchIndex> {
        self.calls.read().await.iter().map(|c| c.index).collect()
    }

    /// Number of calls made for `index`.
    pub async fn call_count_for(&self, index: BatchIndex) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.index == index)
            .count()
    }

    /// Calls currently running (hung calls included).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PartialProcessor for MockPartialProcessor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn process_partial(
        &self,
        ctx: &SessionContext,
        index: BatchIndex,
        payload: Payload,
    ) -> Result<(), StageError> {
        self.calls.write().await.push(RecordedPartial {
            index,
            generation: ctx.generation,
            payload,
            started_at: Instant::now(),
        });
        let now_running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_running, Ordering::SeqCst);

        if self.hanging.read().await.contains(&index) {
            std::future::pending::<()>().await;
        }

        let delay = match self.delays.read().await.get(&index) {
            Some(delay) => *delay,
            None => *self.default_delay.read().await,
        };
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.read().await.contains(&index) {
            return Err(StageError::Failed(format!("mock failure for batch {}", index)));
        }
        Ok(())
    }
}
