//! Session orchestrator implementation.
//!
//! A single actor task owns the session, its ledger and the outstanding
//! finalize request. Callers talk to it through [`OrchestratorHandle`];
//! dispatched stage calls report back over an event channel. After every
//! command, event or timer wake the actor runs one drain pass:
//! - dispatch pending batches into free concurrency slots
//! - advance the finalize request (readiness, forced run, retry)
//! - schedule the next timer wake, if any

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::metrics::{
    result_label, FINALIZE_ATTEMPTS, FINALIZE_DURATION, FINALIZE_FORCED, FINALIZE_OUTCOMES,
    PARTIALS_COMPLETED, PARTIALS_DISPATCHED, PARTIALS_IN_FLIGHT, PARTIAL_DURATION,
    SESSIONS_STARTED, STALE_COMPLETIONS,
};
use crate::session::{
    BatchIndex, Payload, Session, SessionContext, SessionState, StatusSnapshot, WorkLedger,
};
use crate::stage::{FinalizeInput, FinalizeStage, PartialProcessor, StageError};

use super::config::OrchestratorConfig;
use super::finalize::{FinalizePhase, FinalizeReply, FinalizeRequest, Readiness};
use super::types::{EnqueueAck, FinalizeError, FinalizeOutcome, OrchestratorError, StartOptions};

/// Callback invoked with a fresh snapshot after every session mutation.
pub type StatusCallback = Arc<dyn Fn(&StatusSnapshot) + Send + Sync>;

const COMMAND_BUFFER: usize = 64;

/// Builder for the session actor.
pub struct SessionOrchestrator {
    config: OrchestratorConfig,
    processor: Arc<dyn PartialProcessor>,
    finalizer: Arc<dyn FinalizeStage>,
    status_callback: Option<StatusCallback>,
}

impl SessionOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        processor: Arc<dyn PartialProcessor>,
        finalizer: Arc<dyn FinalizeStage>,
    ) -> Self {
        Self {
            config,
            processor,
            finalizer,
            status_callback: None,
        }
    }

    /// Set a callback to be notified on every session mutation.
    pub fn with_status_callback(mut self, callback: StatusCallback) -> Self {
        self.status_callback = Some(callback);
        self
    }

    /// Spawn the actor on the current runtime.
    ///
    /// The actor stops when [`OrchestratorHandle::shutdown`] is called or when
    /// every handle has been dropped.
    pub fn spawn(self) -> OrchestratorHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        info!(
            processor = self.processor.name(),
            finalizer = self.finalizer.name(),
            max_concurrent_partials = self.config.max_concurrent_partials,
            "Starting session orchestrator"
        );

        let actor = SessionActor {
            config: self.config,
            processor: self.processor,
            finalizer: self.finalizer,
            status_callback: self.status_callback,
            events: event_tx,
            session: None,
            ledger: WorkLedger::new(),
            finalize: None,
            reason: None,
            summary: None,
            generation: 0,
            wake_at: None,
        };
        tokio::spawn(actor.run(command_rx, event_rx));

        OrchestratorHandle {
            commands: command_tx,
        }
    }
}

/// Cloneable handle to a running orchestrator.
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl OrchestratorHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, OrchestratorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| OrchestratorError::ActorUnavailable)?;
        reply_rx
            .await
            .map_err(|_| OrchestratorError::ActorUnavailable)
    }

    /// Begin a new session generation, discarding any previous one.
    pub async fn start_consultation(
        &self,
        session_id: impl Into<String>,
        participant: impl Into<String>,
        options: StartOptions,
    ) -> Result<StatusSnapshot, OrchestratorError> {
        let session_id = session_id.into();
        let participant = participant.into();
        self.request(|reply| SessionCommand::Start {
            session_id,
            participant,
            options,
            reply,
        })
        .await
    }

    /// Queue a partial batch. Repeated indices are acknowledged as duplicates.
    pub async fn enqueue_partial(
        &self,
        index: BatchIndex,
        payload: Payload,
    ) -> Result<EnqueueAck, OrchestratorError> {
        self.request(|reply| SessionCommand::Enqueue {
            index,
            payload,
            reply,
        })
        .await?
    }

    /// Register a finalize request and return a future for its outcome.
    ///
    /// Protocol errors are returned immediately; the returned future resolves
    /// once the terminal step succeeds or gives up.
    pub async fn request_finalize(
        &self,
        last_index: BatchIndex,
        payload: Payload,
    ) -> Result<PendingFinalize, OrchestratorError> {
        let (result_tx, result_rx) = oneshot::channel();
        self.request(|ack| SessionCommand::Finalize {
            last_index,
            payload,
            ack,
            result: result_tx,
        })
        .await??;
        Ok(PendingFinalize { result: result_rx })
    }

    /// Finalize the session and wait for the outcome.
    pub async fn finalize(
        &self,
        last_index: BatchIndex,
        payload: Payload,
    ) -> Result<FinalizeOutcome, OrchestratorError> {
        self.request_finalize(last_index, payload).await?.await
    }

    /// Current snapshot of the session.
    pub async fn status(&self) -> Result<StatusSnapshot, OrchestratorError> {
        self.request(|reply| SessionCommand::Status { reply }).await
    }

    /// Fail the active session and reject any outstanding finalize.
    pub async fn abort(&self, reason: impl Into<String>) -> Result<(), OrchestratorError> {
        let reason = reason.into();
        self.request(|reply| SessionCommand::Abort { reason, reply })
            .await?
    }

    /// Stop the actor. An outstanding finalize is rejected with `Shutdown`.
    pub async fn shutdown(&self) -> Result<(), OrchestratorError> {
        self.request(|reply| SessionCommand::Shutdown { reply }).await
    }
}

/// Future returned by [`OrchestratorHandle::request_finalize`].
pub struct PendingFinalize {
    result: oneshot::Receiver<Result<FinalizeOutcome, FinalizeError>>,
}

impl Future for PendingFinalize {
    type Output = Result<FinalizeOutcome, OrchestratorError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.result).poll(cx).map(|received| match received {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(e.into()),
            // the actor dropped the request without resolving it
            Err(_) => Err(FinalizeError::Shutdown.into()),
        })
    }
}

enum SessionCommand {
    Start {
        session_id: String,
        participant: String,
        options: StartOptions,
        reply: oneshot::Sender<StatusSnapshot>,
    },
    Enqueue {
        index: BatchIndex,
        payload: Payload,
        reply: oneshot::Sender<Result<EnqueueAck, OrchestratorError>>,
    },
    Finalize {
        last_index: BatchIndex,
        payload: Payload,
        ack: oneshot::Sender<Result<(), OrchestratorError>>,
        result: FinalizeReply,
    },
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    Abort {
        reason: String,
        reply: oneshot::Sender<Result<(), OrchestratorError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

enum SessionEvent {
    PartialFinished {
        generation: u64,
        index: BatchIndex,
        result: Result<(), StageError>,
    },
    FinalizeFinished {
        generation: u64,
        attempt: u32,
        result: Result<Value, StageError>,
        view: AttemptView,
    },
}

/// Ledger lists as the finalize stage saw them when the attempt launched.
/// A successful attempt reports these, not whatever changed while it ran.
struct AttemptView {
    missing_batches: Vec<BatchIndex>,
    processed_batches: Vec<BatchIndex>,
    processed: Vec<BatchIndex>,
    lowest_unprocessed: BatchIndex,
}

/// Ledger lists kept after a session closes, so late readers still see how
/// it ended.
struct ClosedSummary {
    processed: Vec<BatchIndex>,
    missing: Vec<BatchIndex>,
    lowest_unprocessed: BatchIndex,
}

struct SessionActor {
    config: OrchestratorConfig,
    processor: Arc<dyn PartialProcessor>,
    finalizer: Arc<dyn FinalizeStage>,
    status_callback: Option<StatusCallback>,
    events: mpsc::UnboundedSender<SessionEvent>,

    session: Option<Session>,
    ledger: WorkLedger,
    finalize: Option<FinalizeRequest>,
    reason: Option<String>,
    summary: Option<ClosedSummary>,
    generation: u64,
    wake_at: Option<Instant>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        loop {
            let wake_at = self.wake_at;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(event) = events.recv() => self.handle_event(event),
                _ = sleep_until(wake_at.unwrap_or_else(Instant::now)), if wake_at.is_some() => {
                    self.wake_at = None;
                }
            }
            self.drain();
        }
        info!("Session orchestrator stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start {
                session_id,
                participant,
                options,
                reply,
            } => {
                let snapshot = self.start(session_id, participant, options);
                let _ = reply.send(snapshot);
            }
            SessionCommand::Enqueue {
                index,
                payload,
                reply,
            } => {
                let _ = reply.send(self.enqueue(index, payload));
            }
            SessionCommand::Finalize {
                last_index,
                payload,
                ack,
                result,
            } => {
                let _ = ack.send(self.request_finalize(last_index, payload, result));
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::Abort { reason, reply } => {
                let _ = reply.send(self.abort(reason));
            }
            SessionCommand::Shutdown { .. } => {}
        }
    }

    fn start(
        &mut self,
        session_id: String,
        participant: String,
        options: StartOptions,
    ) -> StatusSnapshot {
        if let Some(mut request) = self.finalize.take() {
            info!(
                generation = self.generation,
                "Superseding outstanding finalize request"
            );
            request.resolve(Err(FinalizeError::Superseded));
        }

        self.generation += 1;
        self.ledger.clear();
        self.reason = None;
        self.summary = None;
        self.wake_at = None;

        info!(
            session_id = %session_id,
            generation = self.generation,
            recovering = options.recovering,
            "Consultation started"
        );
        SESSIONS_STARTED.inc();

        self.session = Some(Session::new(
            session_id,
            participant,
            self.generation,
            options.recovering,
        ));
        self.publish()
    }

    fn enqueue(
        &mut self,
        index: BatchIndex,
        payload: Payload,
    ) -> Result<EnqueueAck, OrchestratorError> {
        let session = self
            .session
            .as_mut()
            .ok_or(OrchestratorError::NoActiveSession)?;
        if session.state.is_terminal() {
            return Err(OrchestratorError::SessionClosed {
                state: session.state,
            });
        }

        if !self.ledger.enqueue(index, payload) {
            debug!(session_id = %session.id, index, "Duplicate partial ignored");
            return Ok(EnqueueAck::Duplicate);
        }

        if matches!(
            session.state,
            SessionState::Recording | SessionState::Recovering
        ) {
            session.transition(SessionState::ProcessingPartials);
        } else {
            session.touch();
        }
        debug!(session_id = %session.id, index, "Partial enqueued");

        self.publish();
        Ok(EnqueueAck::Accepted)
    }

    fn request_finalize(
        &mut self,
        last_index: BatchIndex,
        payload: Payload,
        reply: FinalizeReply,
    ) -> Result<(), OrchestratorError> {
        let session = self
            .session
            .as_mut()
            .ok_or(OrchestratorError::NoActiveSession)?;
        if session.state.is_terminal() {
            return Err(OrchestratorError::SessionClosed {
                state: session.state,
            });
        }
        if self.finalize.is_some() {
            return Err(OrchestratorError::FinalizeInProgress);
        }
        if last_index > self.config.max_last_index {
            return Err(OrchestratorError::LastIndexTooLarge {
                last_index,
                max: self.config.max_last_index,
            });
        }

        info!(
            session_id = %session.id,
            generation = session.generation,
            last_index,
            "Finalize requested"
        );
        session.transition(SessionState::ProcessingPartials);
        self.finalize = Some(FinalizeRequest::new(last_index, payload, reply));

        self.publish();
        Ok(())
    }

    fn abort(&mut self, reason: String) -> Result<(), OrchestratorError> {
        let state = self
            .session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle);
        if state == SessionState::Idle || state.is_terminal() {
            return Err(OrchestratorError::NotActive { state });
        }

        if let Some(mut request) = self.finalize.take() {
            FINALIZE_OUTCOMES.with_label_values(&["aborted"]).inc();
            FINALIZE_DURATION
                .with_label_values(&["aborted"])
                .observe(request.received.elapsed().as_secs_f64());
            request.resolve(Err(FinalizeError::Aborted {
                reason: reason.clone(),
            }));
        }

        if let Some(session) = self.session.as_mut() {
            warn!(
                session_id = %session.id,
                generation = session.generation,
                reason = %reason,
                "Session aborted"
            );
            session.transition(SessionState::Failed);
        }
        self.reason = Some(format!("aborted: {}", reason));
        self.ledger.clear();
        self.wake_at = None;

        self.publish();
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(mut request) = self.finalize.take() {
            request.resolve(Err(FinalizeError::Shutdown));
        }
    }

    /// Whether a completion from `generation` may still touch the session.
    fn accepts(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.generation == generation && !s.state.is_terminal())
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::PartialFinished {
                generation,
                index,
                result,
            } => {
                if !self.accepts(generation) {
                    STALE_COMPLETIONS.inc();
                    debug!(generation, index, "Discarding stale partial completion");
                    return;
                }
                if let Err(e) = &result {
                    warn!(generation, index, error = %e, "Partial batch failed, recording as missing");
                }
                if self.ledger.complete(index, result.is_ok()) {
                    if let Some(session) = self.session.as_mut() {
                        session.touch();
                    }
                    self.publish();
                }
            }
            SessionEvent::FinalizeFinished {
                generation,
                attempt,
                result,
                view,
            } => {
                if !self.accepts(generation) || self.finalize.is_none() {
                    STALE_COMPLETIONS.inc();
                    debug!(generation, attempt, "Discarding stale finalize completion");
                    return;
                }
                match result {
                    Ok(value) => self.complete_finalize(value, view),
                    Err(e) => self.fail_attempt(attempt, e),
                }
            }
        }
    }

    /// One pass over everything that may have become possible.
    fn drain(&mut self) {
        self.dispatch_ready();
        self.advance_finalize(Instant::now());
        self.wake_at = self.finalize.as_ref().and_then(|request| match request.phase {
            FinalizePhase::Waiting { recheck_at } => Some(recheck_at),
            FinalizePhase::Backoff { until } => Some(until),
            FinalizePhase::Running => None,
        });
    }

    fn dispatch_ready(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.state.is_terminal() {
            return;
        }

        let slots = self
            .config
            .max_concurrent_partials
            .saturating_sub(self.ledger.in_flight_len());
        let batch = self.ledger.take_dispatchable(slots);
        if batch.is_empty() {
            return;
        }

        let ctx = session.context();
        for (index, payload) in batch {
            self.spawn_partial(ctx.clone(), index, payload);
        }
        self.publish();
    }

    fn spawn_partial(&self, ctx: SessionContext, index: BatchIndex, payload: Payload) {
        let processor = Arc::clone(&self.processor);
        let events = self.events.clone();

        debug!(
            session_id = %ctx.session_id,
            generation = ctx.generation,
            index,
            "Dispatching partial batch"
        );
        PARTIALS_DISPATCHED.inc();
        PARTIALS_IN_FLIGHT.inc();

        tokio::spawn(async move {
            let started = Instant::now();
            let result = AssertUnwindSafe(processor.process_partial(&ctx, index, payload))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(StageError::Failed(panic_message(&*panic))));

            let label = result_label(result.is_ok());
            PARTIAL_DURATION
                .with_label_values(&[label])
                .observe(started.elapsed().as_secs_f64());
            PARTIALS_COMPLETED.with_label_values(&[label]).inc();
            PARTIALS_IN_FLIGHT.dec();

            let _ = events.send(SessionEvent::PartialFinished {
                generation: ctx.generation,
                index,
                result,
            });
        });
    }

    fn advance_finalize(&mut self, now: Instant) {
        let Some(request) = self.finalize.as_ref() else {
            return;
        };

        let phase = request.phase;
        match phase {
            FinalizePhase::Running => {}
            FinalizePhase::Backoff { until } => {
                if now < until {
                    return;
                }
                if request.budget_exhausted(now, self.config.finalize_budget()) {
                    let err = self.timed_out(now);
                    self.fail_finalize(err);
                    return;
                }
                self.launch_attempt(now);
            }
            FinalizePhase::Waiting { .. } => {
                let readiness = request.readiness(
                    &self.ledger,
                    now,
                    self.config.finalize_wait(),
                    self.config.readiness_poll(),
                );
                match readiness {
                    Readiness::Ready => self.launch_attempt(now),
                    Readiness::Forced { outstanding } => {
                        self.force_finalize(outstanding);
                        self.launch_attempt(now);
                    }
                    Readiness::Wait { until } => {
                        if let Some(request) = self.finalize.as_mut() {
                            request.phase = FinalizePhase::Waiting { recheck_at: until };
                        }
                    }
                }
            }
        }
    }

    fn force_finalize(&mut self, outstanding: Vec<BatchIndex>) {
        let Some(request) = self.finalize.as_mut() else {
            return;
        };
        request.forced = true;
        FINALIZE_FORCED.inc();
        warn!(
            generation = self.generation,
            outstanding = ?outstanding,
            wait_ms = self.config.finalize_wait_ms,
            "Finalize readiness timed out, forcing terminal step"
        );
        self.reason = Some(format!(
            "finalize forced after {}ms with outstanding batches {:?}",
            self.config.finalize_wait_ms, outstanding
        ));
    }

    fn launch_attempt(&mut self, now: Instant) {
        let (Some(session), Some(request)) = (self.session.as_mut(), self.finalize.as_mut()) else {
            return;
        };

        request.attempts += 1;
        request.phase = FinalizePhase::Running;
        let attempt = request.attempts;
        let cap = request.attempt_cap(now, self.config.finalize_budget());

        let view = AttemptView {
            missing_batches: self.ledger.missing_for(request.last_index),
            processed_batches: self.ledger.succeeded(),
            processed: self.ledger.processed(),
            lowest_unprocessed: self.ledger.lowest_unprocessed(),
        };
        let input = FinalizeInput {
            last_index: request.last_index,
            payload: request.payload.clone(),
            missing_batches: view.missing_batches.clone(),
            processed_batches: view.processed_batches.clone(),
        };

        session.transition(SessionState::Finalizing);
        let ctx = session.context();
        info!(
            session_id = %ctx.session_id,
            generation = ctx.generation,
            attempt,
            missing = view.missing_batches.len(),
            cap_ms = cap.as_millis() as u64,
            "Running finalize attempt"
        );

        let finalizer = Arc::clone(&self.finalizer);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = match timeout(
                cap,
                AssertUnwindSafe(finalizer.finalize(&ctx, input)).catch_unwind(),
            )
            .await
            {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => Err(StageError::Failed(panic_message(&*panic))),
                Err(_) => Err(StageError::Timeout {
                    timeout_ms: cap.as_millis() as u64,
                }),
            };
            FINALIZE_ATTEMPTS
                .with_label_values(&[result_label(result.is_ok())])
                .inc();

            let _ = events.send(SessionEvent::FinalizeFinished {
                generation: ctx.generation,
                attempt,
                result,
                view,
            });
        });

        self.publish();
    }

    fn complete_finalize(&mut self, result: Value, view: AttemptView) {
        let (Some(session), Some(mut request)) = (self.session.as_mut(), self.finalize.take())
        else {
            return;
        };

        let AttemptView {
            missing_batches,
            processed_batches,
            processed,
            lowest_unprocessed,
        } = view;
        let state = if missing_batches.is_empty() {
            SessionState::Completed
        } else {
            SessionState::Provisional
        };
        session.transition(state);
        if state == SessionState::Completed {
            // a forced run whose retry saw every batch land is not degraded
            self.reason = None;
        }

        FINALIZE_OUTCOMES.with_label_values(&[state.as_str()]).inc();
        FINALIZE_DURATION
            .with_label_values(&[state.as_str()])
            .observe(request.received.elapsed().as_secs_f64());
        info!(
            session_id = %session.id,
            generation = session.generation,
            attempts = request.attempts,
            missing = ?missing_batches,
            state = %state,
            "Finalize succeeded"
        );

        let outcome = FinalizeOutcome {
            session_id: session.id.clone(),
            state,
            result,
            missing_batches: missing_batches.clone(),
            processed_batches,
            attempts: request.attempts,
            forced: request.forced,
        };

        self.close_ledger(ClosedSummary {
            processed,
            missing: missing_batches,
            lowest_unprocessed,
        });
        self.publish();
        request.resolve(Ok(outcome));
    }

    fn fail_attempt(&mut self, attempt: u32, error: StageError) {
        let now = Instant::now();
        let budget = self.config.finalize_budget();
        let Some(request) = self.finalize.as_mut() else {
            return;
        };
        request.last_error = Some(error.to_string());
        warn!(
            generation = self.generation,
            attempt,
            error = %error,
            "Finalize attempt failed"
        );

        if request.budget_exhausted(now, budget) {
            let err = self.timed_out(now);
            self.fail_finalize(err);
            return;
        }
        if request.attempts > self.config.max_finalize_retries {
            let err = FinalizeError::HandlerFailed {
                attempts: request.attempts,
                last_error: error.to_string(),
            };
            self.fail_finalize(err);
            return;
        }

        let until = now + self.config.retry_backoff();
        if request.remaining_budget(now, budget) <= self.config.retry_backoff() {
            // the next attempt could not start inside the budget
            let err = self.timed_out(now);
            self.fail_finalize(err);
            return;
        }

        request.phase = FinalizePhase::Backoff { until };
        if let Some(session) = self.session.as_mut() {
            session.transition(SessionState::ProcessingPartials);
        }
        info!(
            generation = self.generation,
            attempt,
            backoff_ms = self.config.retry_backoff_ms,
            "Retrying finalize after backoff"
        );
        self.reason = Some(format!(
            "finalize attempt {} failed, retrying: {}",
            attempt, error
        ));
        self.publish();
    }

    fn timed_out(&self, now: Instant) -> FinalizeError {
        match self.finalize.as_ref() {
            Some(request) => FinalizeError::TimedOut {
                attempts: request.attempts,
                elapsed_ms: request.budget_elapsed(now).as_millis() as u64,
                last_error: request.last_error.clone().unwrap_or_default(),
            },
            None => FinalizeError::TimedOut {
                attempts: 0,
                elapsed_ms: 0,
                last_error: String::new(),
            },
        }
    }

    fn fail_finalize(&mut self, err: FinalizeError) {
        let Some(mut request) = self.finalize.take() else {
            return;
        };

        FINALIZE_OUTCOMES.with_label_values(&["failed"]).inc();
        FINALIZE_DURATION
            .with_label_values(&["failed"])
            .observe(request.received.elapsed().as_secs_f64());
        if let Some(session) = self.session.as_mut() {
            warn!(
                session_id = %session.id,
                generation = session.generation,
                error = %err,
                "Finalize gave up, session failed"
            );
            session.transition(SessionState::Failed);
        }
        self.reason = Some(err.to_string());

        let summary = ClosedSummary {
            processed: self.ledger.processed(),
            missing: self.ledger.missing_for(request.last_index),
            lowest_unprocessed: self.ledger.lowest_unprocessed(),
        };
        self.close_ledger(summary);
        self.publish();
        request.resolve(Err(err));
    }

    /// Keep the final lists for snapshots, then reset the ledger.
    fn close_ledger(&mut self, summary: ClosedSummary) {
        self.summary = Some(summary);
        self.ledger.clear();
        self.wake_at = None;
    }

    fn snapshot(&self) -> StatusSnapshot {
        let Some(session) = self.session.as_ref() else {
            return StatusSnapshot::idle();
        };

        let (processed, missing, lowest_unprocessed) = match &self.summary {
            Some(summary) => (
                summary.processed.clone(),
                summary.missing.clone(),
                summary.lowest_unprocessed,
            ),
            None => (
                self.ledger.processed(),
                self.ledger.missing(),
                self.ledger.lowest_unprocessed(),
            ),
        };

        StatusSnapshot {
            session_id: Some(session.id.clone()),
            participant: Some(session.participant.clone()),
            generation: session.generation,
            state: session.state,
            processed,
            pending: self.ledger.pending(),
            in_flight: self.ledger.in_flight(),
            lowest_unprocessed,
            missing,
            reason: self.reason.clone(),
            finalize: self.finalize.as_ref().map(FinalizeRequest::progress),
            updated_at: session.updated_at,
        }
    }

    /// Build a snapshot and hand it to the status callback.
    fn publish(&self) -> StatusSnapshot {
        let snapshot = self.snapshot();
        if let Some(callback) = &self.status_callback {
            let delivered = std::panic::catch_unwind(AssertUnwindSafe(|| callback(&snapshot)));
            if delivered.is_err() {
                error!("Status callback panicked");
            }
        }
        snapshot
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}
