//! Session lifecycle integration tests.
//!
//! These tests drive the orchestrator through complete sessions with mock
//! stages and a paused tokio clock:
//! recording -> processing_partials -> finalizing -> completed | provisional | failed

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::{sleep, Instant};

use cadence_core::{
    testing::{fixtures, MockFinalizeStage, MockPartialProcessor, RecordingObserver},
    EnqueueAck, FinalizeError, OrchestratorConfig, OrchestratorError, OrchestratorHandle,
    SessionState, StageError, StartOptions,
};

/// Test helper bundling the mocks with a running orchestrator.
struct TestHarness {
    processor: Arc<MockPartialProcessor>,
    finalizer: Arc<MockFinalizeStage>,
    handle: OrchestratorHandle,
    observer: RecordingObserver,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    fn with_config(config: OrchestratorConfig) -> Self {
        let processor = Arc::new(MockPartialProcessor::new());
        let finalizer = Arc::new(MockFinalizeStage::new());
        let (handle, observer) = fixtures::spawn_orchestrator(config, &processor, &finalizer);
        Self {
            processor,
            finalizer,
            handle,
            observer,
        }
    }

    async fn start(&self, session_id: &str) {
        self.handle
            .start_consultation(session_id, "Dr. Rivera", StartOptions::default())
            .await
            .expect("start failed");
    }

    async fn enqueue(&self, index: u32) -> EnqueueAck {
        self.handle
            .enqueue_partial(index, fixtures::payload(index))
            .await
            .expect("enqueue failed")
    }
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_dispatch_respects_concurrency_limit() {
    // Scenario A
    let h = TestHarness::with_config(fixtures::config_with_limit(2));
    h.processor.set_delay(0, Duration::from_secs(1)).await;
    h.processor.set_delay(1, Duration::from_secs(2)).await;
    h.processor.set_delay(2, Duration::from_secs(5)).await;
    h.start("s-a").await;

    for i in 0..3 {
        assert_eq!(h.enqueue(i).await, EnqueueAck::Accepted);
    }

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.in_flight, vec![0, 1]);
    assert_eq!(status.pending, vec![2]);

    sleep(Duration::from_millis(1500)).await;

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.processed, vec![0]);
    assert_eq!(status.in_flight, vec![1, 2]);
    assert!(status.pending.is_empty());

    let calls = h.processor.recorded_calls().await;
    let started = |i: u32| calls.iter().find(|c| c.index == i).unwrap().started_at;
    assert!(started(2) >= started(0) + Duration::from_secs(1));
    assert_eq!(h.processor.max_in_flight(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_never_exceeds_limit() {
    let h = TestHarness::with_config(fixtures::config_with_limit(3));
    for i in 0..10 {
        h.processor
            .set_delay(i, Duration::from_millis(100 + (i as u64 * 37) % 250))
            .await;
    }
    h.start("s-burst").await;

    for i in (0..10).rev() {
        h.enqueue(i).await;
    }
    let outcome = h.handle.finalize(10, json!({})).await.unwrap();

    assert_eq!(outcome.state, SessionState::Completed);
    assert_eq!(outcome.processed_batches, (0..10).collect::<Vec<_>>());
    assert_eq!(h.processor.max_in_flight(), 3);
    for snapshot in h.observer.snapshots() {
        assert!(snapshot.in_flight.len() <= 3);
    }
}

#[tokio::test(start_paused = true)]
async fn test_lowest_indices_dispatch_first() {
    let h = TestHarness::with_config(fixtures::config_with_limit(1));
    h.processor.set_default_delay(Duration::from_secs(1)).await;
    h.start("s-order").await;

    // 9 dispatches on arrival, the rest queue up behind it
    for i in [9, 4, 7, 0] {
        h.enqueue(i).await;
    }
    h.handle.finalize(10, json!({})).await.ok();

    assert_eq!(h.processor.started_indices().await, vec![9, 0, 4, 7]);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_enqueue_dispatches_once() {
    let h = TestHarness::new();
    h.start("s-dup").await;

    assert_eq!(h.enqueue(0).await, EnqueueAck::Accepted);
    assert_eq!(h.enqueue(0).await, EnqueueAck::Duplicate);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.enqueue(0).await, EnqueueAck::Duplicate);

    assert_eq!(h.processor.call_count_for(0).await, 1);
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.processed, vec![0]);
    assert_eq!(status.lowest_unprocessed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_partial_is_recorded_not_retried() {
    let h = TestHarness::new();
    h.processor.fail(1).await;
    h.start("s-fail").await;

    for i in 0..3 {
        h.enqueue(i).await;
    }
    let outcome = h.handle.finalize(3, json!({})).await.unwrap();

    assert_eq!(outcome.state, SessionState::Provisional);
    assert_eq!(outcome.missing_batches, vec![1]);
    assert_eq!(outcome.processed_batches, vec![0, 2]);
    assert!(!outcome.forced);
    assert_eq!(h.processor.call_count_for(1).await, 1);

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, SessionState::Provisional);
    assert_eq!(status.missing, vec![1]);
}

// =============================================================================
// Finalize readiness
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_finalize_waits_for_pending_batch() {
    // Scenario B
    let h = TestHarness::new();
    h.processor.set_delay(2, Duration::from_secs(1)).await;
    h.start("s-b").await;

    h.enqueue(0).await;
    h.enqueue(1).await;
    sleep(Duration::from_millis(200)).await;
    h.enqueue(2).await;

    let outcome = h.handle.finalize(3, json!({"template": "soap"})).await.unwrap();

    assert_eq!(outcome.state, SessionState::Completed);
    assert!(outcome.missing_batches.is_empty());
    assert_eq!(outcome.attempts, 1);

    let calls = h.finalizer.recorded_calls().await;
    assert_eq!(calls.len(), 1);
    assert!(calls[0].input.missing_batches.is_empty());
    assert_eq!(calls[0].input.processed_batches, vec![0, 1, 2]);
    assert_eq!(calls[0].input.payload["template"], "soap");

    let batch_two = h
        .processor
        .recorded_calls()
        .await
        .into_iter()
        .find(|c| c.index == 2)
        .unwrap()
        .started_at;
    assert!(calls[0].started_at >= batch_two + Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_finalize_waits_for_batch_that_arrives_late() {
    let h = TestHarness::new();
    h.start("s-late").await;
    h.enqueue(0).await;

    let pending = h.handle.request_finalize(2, json!({})).await.unwrap();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(h.finalizer.call_count().await, 0);

    h.enqueue(1).await;
    let outcome = pending.await.unwrap();

    assert_eq!(outcome.state, SessionState::Completed);
    assert_eq!(outcome.processed_batches, vec![0, 1]);
    assert_eq!(h.finalizer.call_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_finalize_forced_after_wait_timeout() {
    // Scenario C
    let h = TestHarness::new();
    h.processor.hang(2).await;
    h.start("s-c").await;

    for i in 0..3 {
        h.enqueue(i).await;
    }
    let started = Instant::now();
    let outcome = h.handle.finalize(3, json!({})).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(180_000));
    assert_eq!(outcome.state, SessionState::Provisional);
    assert_eq!(outcome.missing_batches, vec![2]);
    assert!(outcome.forced);
    assert_eq!(h.finalizer.call_count().await, 1);

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, SessionState::Provisional);
    assert!(status.reason.unwrap().contains("forced"));
}

#[tokio::test(start_paused = true)]
async fn test_forced_outcome_uses_lists_from_attempt_launch() {
    let h = TestHarness::new();
    h.processor.set_delay(2, Duration::from_secs(181)).await;
    h.finalizer.set_delay(Duration::from_secs(5)).await;
    h.start("s-launch-lists").await;
    for i in 0..3 {
        h.enqueue(i).await;
    }

    // forced at 180s; batch 2 lands at 181s while the attempt is running
    let outcome = h.handle.finalize(3, json!({})).await.unwrap();

    assert_eq!(outcome.state, SessionState::Provisional);
    assert_eq!(outcome.missing_batches, vec![2]);
    assert_eq!(outcome.processed_batches, vec![0, 1]);
    let calls = h.finalizer.recorded_calls().await;
    assert_eq!(calls[0].input.missing_batches, outcome.missing_batches);
    assert_eq!(calls[0].input.processed_batches, outcome.processed_batches);

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.processed, vec![0, 1]);
    assert_eq!(status.missing, vec![2]);
    assert_eq!(status.lowest_unprocessed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_last_index_above_limit_is_rejected() {
    let h = TestHarness::with_config(OrchestratorConfig {
        max_last_index: 1_000,
        ..OrchestratorConfig::default()
    });
    h.start("s-huge").await;
    h.enqueue(0).await;

    match h.handle.request_finalize(u32::MAX, json!({})).await {
        Err(OrchestratorError::LastIndexTooLarge { last_index, max }) => {
            assert_eq!(last_index, u32::MAX);
            assert_eq!(max, 1_000);
        }
        other => panic!("expected LastIndexTooLarge, got {:?}", other.err()),
    }
    assert!(matches!(
        h.handle.request_finalize(1_001, json!({})).await,
        Err(OrchestratorError::LastIndexTooLarge { .. })
    ));
    assert_eq!(h.finalizer.call_count().await, 0);

    let status = h.handle.status().await.unwrap();
    assert!(status.finalize.is_none());
    assert_ne!(status.state, SessionState::Failed);

    // the bound itself is allowed
    let pending = h.handle.request_finalize(1_000, json!({})).await;
    assert!(pending.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_finalize_with_no_batches_runs_immediately() {
    let h = TestHarness::new();
    h.start("s-empty").await;

    let outcome = h.handle.finalize(0, json!({})).await.unwrap();
    assert_eq!(outcome.state, SessionState::Completed);
    assert_eq!(outcome.result, json!({"status": "ok"}));
}

#[tokio::test(start_paused = true)]
async fn test_second_finalize_rejected_without_side_effects() {
    let h = TestHarness::new();
    h.processor.hang(0).await;
    h.start("s-twice").await;
    h.enqueue(0).await;

    let first = h.handle.request_finalize(1, json!({})).await.unwrap();
    let second = h.handle.request_finalize(1, json!({})).await;
    assert!(matches!(second, Err(OrchestratorError::FinalizeInProgress)));

    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.finalizer.call_count().await, 0);

    h.handle.abort("clinician cancelled").await.unwrap();
    assert!(matches!(
        first.await,
        Err(OrchestratorError::Finalize(FinalizeError::Aborted { .. }))
    ));
}

// =============================================================================
// Finalize retry
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_finalize_retries_after_failure() {
    // Scenario D
    let h = TestHarness::new();
    h.finalizer
        .push_outcome(Err(StageError::Failed("llm overloaded".into())))
        .await;
    h.finalizer
        .push_outcome(Ok(json!({"note": "second attempt"})))
        .await;
    h.start("s-d").await;
    h.enqueue(0).await;

    let outcome = h.handle.finalize(1, json!({})).await.unwrap();

    assert_eq!(outcome.result, json!({"note": "second attempt"}));
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.state, SessionState::Completed);

    let calls = h.finalizer.recorded_calls().await;
    assert_eq!(calls.len(), 2);
    assert!(calls[1].started_at >= calls[0].started_at + Duration::from_millis(3_000));
    assert!(h
        .observer
        .snapshots()
        .iter()
        .any(|s| s.reason.as_deref().is_some_and(|r| r.contains("retrying"))));
}

#[tokio::test(start_paused = true)]
async fn test_finalize_times_out_when_budget_exhausted() {
    // Scenario E
    let h = TestHarness::new();
    h.finalizer.set_delay(Duration::from_secs(50)).await;
    h.finalizer
        .fail_always(StageError::Failed("merge failed".into()))
        .await;
    h.start("s-e").await;

    let started = Instant::now();
    let err = h.handle.finalize(0, json!({})).await.unwrap_err();

    match err {
        OrchestratorError::Finalize(FinalizeError::TimedOut {
            attempts,
            elapsed_ms,
            ..
        }) => {
            assert_eq!(attempts, 3);
            assert!(elapsed_ms >= 120_000);
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(120) && elapsed < Duration::from_secs(121));
    assert_eq!(h.finalizer.call_count().await, 3);

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, SessionState::Failed);
    assert!(status.reason.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_budget_counts_readiness_wait() {
    let h = TestHarness::new();
    h.processor.set_delay(0, Duration::from_secs(118)).await;
    h.finalizer
        .fail_always(StageError::Failed("merge failed".into()))
        .await;
    h.start("s-late-ready").await;
    h.enqueue(0).await;

    let started = Instant::now();
    let err = h.handle.finalize(1, json!({})).await.unwrap_err();

    // ready at 118s, 2s of budget left is less than one backoff
    match err {
        OrchestratorError::Finalize(FinalizeError::TimedOut { attempts, .. }) => {
            assert_eq!(attempts, 1);
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(120));
    assert_eq!(h.finalizer.call_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_forced_finalize_gets_one_attempt() {
    let h = TestHarness::new();
    h.processor.hang(1).await;
    h.finalizer
        .fail_always(StageError::Unavailable("connection refused".into()))
        .await;
    h.start("s-forced-fail").await;
    h.enqueue(0).await;
    h.enqueue(1).await;

    let started = Instant::now();
    let err = h.handle.finalize(2, json!({})).await.unwrap_err();

    match err {
        OrchestratorError::Finalize(FinalizeError::TimedOut { attempts, .. }) => {
            assert_eq!(attempts, 1);
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }
    assert!(started.elapsed() >= Duration::from_secs(180));
    let calls = h.finalizer.recorded_calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].input.missing_batches, vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_forced_first_attempt_is_not_cut_short() {
    let h = TestHarness::new();
    h.processor.hang(1).await;
    h.finalizer.set_delay(Duration::from_secs(30)).await;
    h.start("s-forced-slow").await;
    h.enqueue(0).await;
    h.enqueue(1).await;

    // the wait used up the budget, the attempt still gets to finish
    let outcome = h.handle.finalize(2, json!({})).await.unwrap();

    assert_eq!(outcome.state, SessionState::Provisional);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(h.finalizer.call_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_finalize_handler_failed_after_retries() {
    let h = TestHarness::new();
    h.finalizer
        .fail_always(StageError::Rejected {
            status: 500,
            body: "internal".into(),
        })
        .await;
    h.start("s-hf").await;

    let err = h.handle.finalize(0, json!({})).await.unwrap_err();
    match err {
        OrchestratorError::Finalize(FinalizeError::HandlerFailed {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("500"));
        }
        other => panic!("expected HandlerFailed, got {other:?}"),
    }
    assert_eq!(h.finalizer.call_count().await, 3);
    assert_eq!(
        h.handle.status().await.unwrap().state,
        SessionState::Failed
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_sees_batches_completed_during_backoff() {
    // budget runs from the request, so it must outlast the 180s wait
    let h = TestHarness::with_config(OrchestratorConfig {
        retry_backoff_ms: 30_000,
        finalize_budget_ms: 300_000,
        ..OrchestratorConfig::default()
    });
    h.processor.set_delay(1, Duration::from_secs(200)).await;
    h.finalizer
        .push_outcome(Err(StageError::Unavailable("connection refused".into())))
        .await;
    h.start("s-late-retry").await;
    h.enqueue(0).await;
    h.enqueue(1).await;

    // forced at 180s with batch 1 still running; it lands at 200s, inside
    // the backoff before the second attempt at 210s
    let outcome = h.handle.finalize(2, json!({})).await.unwrap();

    let calls = h.finalizer.recorded_calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].input.missing_batches, vec![1]);
    assert!(calls[1].input.missing_batches.is_empty());
    assert_eq!(outcome.attempts, 2);
    assert!(outcome.forced);
    assert_eq!(outcome.state, SessionState::Completed);
    assert_eq!(outcome.processed_batches, vec![0, 1]);

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, SessionState::Completed);
    assert!(status.reason.is_none());
}

// =============================================================================
// Abort, restart, shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_abort_rejects_finalize_and_clears_ledger() {
    let h = TestHarness::new();
    h.processor.hang(1).await;
    h.start("s-abort").await;
    h.enqueue(0).await;
    h.enqueue(1).await;
    h.enqueue(2).await;

    let pending = h.handle.request_finalize(3, json!({})).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    h.handle.abort("patient left").await.unwrap();

    match pending.await {
        Err(OrchestratorError::Finalize(FinalizeError::Aborted { reason })) => {
            assert_eq!(reason, "patient left")
        }
        other => panic!("expected Aborted, got {other:?}"),
    }

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, SessionState::Failed);
    assert_eq!(status.reason.as_deref(), Some("aborted: patient left"));
    assert!(status.processed.is_empty());
    assert!(status.pending.is_empty());
    assert!(status.in_flight.is_empty());
    assert!(status.finalize.is_none());

    assert!(matches!(
        h.handle.abort("again").await,
        Err(OrchestratorError::NotActive {
            state: SessionState::Failed
        })
    ));
    assert!(matches!(
        h.handle.enqueue_partial(5, json!({})).await,
        Err(OrchestratorError::SessionClosed { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_calls_before_start_are_rejected() {
    let h = TestHarness::new();

    assert!(matches!(
        h.handle.enqueue_partial(0, json!({})).await,
        Err(OrchestratorError::NoActiveSession)
    ));
    assert!(matches!(
        h.handle.request_finalize(1, json!({})).await,
        Err(OrchestratorError::NoActiveSession)
    ));
    assert!(matches!(
        h.handle.abort("nothing").await,
        Err(OrchestratorError::NotActive {
            state: SessionState::Idle
        })
    ));

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, SessionState::Idle);
    assert!(status.session_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_restart_supersedes_outstanding_finalize() {
    let h = TestHarness::new();
    h.processor.hang(0).await;
    h.start("s-old").await;
    h.enqueue(0).await;
    let pending = h.handle.request_finalize(1, json!({})).await.unwrap();

    let snapshot = h
        .handle
        .start_consultation("s-new", "Dr. Rivera", StartOptions { recovering: true })
        .await
        .unwrap();
    assert_eq!(snapshot.state, SessionState::Recovering);
    assert_eq!(snapshot.generation, 2);
    assert!(snapshot.processed.is_empty());

    assert!(matches!(
        pending.await,
        Err(OrchestratorError::Finalize(FinalizeError::Superseded))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stale_completion_ignored_after_restart() {
    let h = TestHarness::new();
    h.processor.set_delay(0, Duration::from_secs(10)).await;
    h.start("s-gen1").await;
    h.enqueue(0).await;

    sleep(Duration::from_secs(1)).await;
    h.start("s-gen2").await;
    h.enqueue(0).await;

    // generation 1's call finishes at 10s, generation 2's at 11s
    sleep(Duration::from_millis(9_500)).await;
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.session_id.as_deref(), Some("s-gen2"));
    assert!(status.processed.is_empty());
    assert_eq!(status.in_flight, vec![0]);

    sleep(Duration::from_secs(1)).await;
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.processed, vec![0]);

    let generations: Vec<u64> = h
        .processor
        .recorded_calls()
        .await
        .iter()
        .map(|c| c.generation)
        .collect();
    assert_eq!(generations, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_session_reusable_after_completion() {
    let h = TestHarness::new();
    h.start("s-first").await;
    h.enqueue(0).await;
    h.handle.finalize(1, json!({})).await.unwrap();

    assert!(matches!(
        h.handle.request_finalize(1, json!({})).await,
        Err(OrchestratorError::SessionClosed {
            state: SessionState::Completed
        })
    ));

    h.start("s-second").await;
    assert_eq!(h.enqueue(0).await, EnqueueAck::Accepted);
    let outcome = h.handle.finalize(1, json!({})).await.unwrap();
    assert_eq!(outcome.session_id, "s-second");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_rejects_outstanding_finalize() {
    let h = TestHarness::new();
    h.processor.hang(0).await;
    h.start("s-shutdown").await;
    h.enqueue(0).await;
    let pending = h.handle.request_finalize(1, json!({})).await.unwrap();

    h.handle.shutdown().await.unwrap();

    assert!(matches!(
        pending.await,
        Err(OrchestratorError::Finalize(FinalizeError::Shutdown))
    ));
    assert!(matches!(
        h.handle.status().await,
        Err(OrchestratorError::ActorUnavailable)
    ));
}

// =============================================================================
// Status broadcasting
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_observer_sees_full_lifecycle() {
    let h = TestHarness::new();
    h.start("s-observed").await;
    h.enqueue(0).await;
    h.handle.finalize(1, json!({})).await.unwrap();

    assert_eq!(
        h.observer.states(),
        vec![
            SessionState::Recording,
            SessionState::ProcessingPartials,
            SessionState::Finalizing,
            SessionState::Completed,
        ]
    );

    let last = h.observer.last().unwrap();
    assert_eq!(last.session_id.as_deref(), Some("s-observed"));
    assert_eq!(last.processed, vec![0]);
    assert!(last.missing.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_reports_finalize_progress() {
    let h = TestHarness::new();
    h.processor.hang(0).await;
    h.start("s-progress").await;
    h.enqueue(0).await;
    let _pending = h.handle.request_finalize(4, json!({})).await.unwrap();

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, SessionState::ProcessingPartials);
    let progress = status.finalize.expect("finalize progress");
    assert_eq!(progress.last_index, 4);
    assert_eq!(progress.attempts, 0);
    assert!(!progress.forced);
}
