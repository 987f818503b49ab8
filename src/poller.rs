//! Polling state machine
//!
//! Drives one tracking session at a time: an immediate probe, then one probe
//! per interval until the transaction is finalized, fails, or the timeout
//! elapses. Each session owns its two [`ScheduledTask`]s, so stopping,
//! resetting or restarting the machine tears the timers down with it.

use crate::config::PollingConfig;
use crate::error::ProbeError;
use crate::lifecycle::{FailureCause, LifecycleState, PollingSnapshot};
use crate::probe::StatusSource;
use crate::schedule::ScheduledTask;
use crate::types::{StatusSample, TransactionIdentifier};
use crate::{Error, Result};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Failure reason recorded when a session runs out of time
pub const TIMED_OUT_REASON: &str = "timed out";

/// Receives lifecycle notifications from a polling session.
///
/// Callbacks run on the session's timer task and must not block.
pub trait LifecycleObserver: Send + Sync {
    fn on_transition(
        &self,
        _identifier: &TransactionIdentifier,
        _from: LifecycleState,
        _to: LifecycleState,
    ) {
    }

    fn on_finalized(&self, _identifier: &TransactionIdentifier, _sample: &StatusSample) {}

    fn on_failed(&self, _identifier: &TransactionIdentifier, _reason: &str) {}
}

/// What a session needs to apply results, shared by its two tasks
struct SessionContext {
    session: u64,
    identifier: TransactionIdentifier,
    source: Arc<dyn StatusSource>,
    observer: Option<Arc<dyn LifecycleObserver>>,
    snapshot: Arc<watch::Sender<PollingSnapshot>>,

    /// Cancelled on stop, restart, reset or terminal state
    timers: CancellationToken,
}

/// Change produced by applying one result
struct Applied {
    from: LifecycleState,
    to: LifecycleState,
    sample: Option<StatusSample>,
    reason: Option<String>,
}

impl SessionContext {
    async fn poll_once(&self) -> ControlFlow<()> {
        let outcome = self.source.sample(&self.identifier).await;
        self.apply(outcome)
    }

    fn apply(&self, outcome: std::result::Result<StatusSample, ProbeError>) -> ControlFlow<()> {
        let mut applied = None;
        self.snapshot.send_if_modified(|snapshot| {
            if !self.is_current(snapshot) {
                return false;
            }
            let from = snapshot.state;
            match outcome {
                Ok(sample) => {
                    snapshot.apply_sample(sample);
                }
                Err(err) if err.is_fatal() => {
                    warn!("Fatal probe error for {}: {}", self.identifier, err);
                    snapshot.fail(FailureCause::ProbeFatal(err.kind), err.message);
                }
                Err(err) => {
                    warn!("Transient probe error for {}: {}", self.identifier, err);
                    snapshot.record_probe_error(err.to_string());
                }
            }
            applied = Some(Applied {
                from,
                to: snapshot.state,
                sample: snapshot.last_sample.clone(),
                reason: snapshot.error.clone(),
            });
            true
        });

        match applied {
            Some(applied) => self.finish(applied),
            None => {
                debug!("Discarded stale probe result for {}", self.identifier);
                ControlFlow::Break(())
            }
        }
    }

    fn expire(&self) {
        let mut applied = None;
        self.snapshot.send_if_modified(|snapshot| {
            if !self.is_current(snapshot) {
                return false;
            }
            let from = snapshot.fail(FailureCause::TimedOut, TIMED_OUT_REASON);
            applied = Some(Applied {
                from,
                to: LifecycleState::Failed,
                sample: snapshot.last_sample.clone(),
                reason: Some(TIMED_OUT_REASON.to_string()),
            });
            true
        });

        if let Some(applied) = applied {
            warn!("Tracking {} timed out in state {}", self.identifier, applied.from);
            let _ = self.finish(applied);
        }
    }

    /// Results only land on a live, non-terminal snapshot of this session
    fn is_current(&self, snapshot: &PollingSnapshot) -> bool {
        !self.timers.is_cancelled()
            && snapshot.session == self.session
            && !snapshot.state.is_terminal()
    }

    fn finish(&self, applied: Applied) -> ControlFlow<()> {
        if applied.from != applied.to {
            debug!(
                "Transaction {} moved {} -> {}",
                self.identifier, applied.from, applied.to
            );
            if let Some(observer) = &self.observer {
                observer.on_transition(&self.identifier, applied.from, applied.to);
            }
        }

        match applied.to {
            LifecycleState::Finalized => {
                self.timers.cancel();
                info!("Transaction {} finalized", self.identifier);
                if let (Some(observer), Some(sample)) = (&self.observer, &applied.sample) {
                    observer.on_finalized(&self.identifier, sample);
                }
                ControlFlow::Break(())
            }
            LifecycleState::Failed => {
                self.timers.cancel();
                let reason = applied.reason.unwrap_or_default();
                warn!("Transaction {} failed: {}", self.identifier, reason);
                if let Some(observer) = &self.observer {
                    observer.on_failed(&self.identifier, &reason);
                }
                ControlFlow::Break(())
            }
            _ => ControlFlow::Continue(()),
        }
    }
}

/// An active session and the timers it owns
struct PollingSession {
    context: Arc<SessionContext>,
    _ticker: ScheduledTask,
    _deadline: ScheduledTask,
}

impl PollingSession {
    fn is_live(&self) -> bool {
        !self.context.timers.is_cancelled()
    }
}

/// Tracks one transaction at a time through its lifecycle
pub struct PollingStateMachine {
    source: Arc<dyn StatusSource>,
    config: PollingConfig,
    observer: Option<Arc<dyn LifecycleObserver>>,
    snapshot: Arc<watch::Sender<PollingSnapshot>>,
    session: Option<PollingSession>,
    next_session: u64,
}

impl PollingStateMachine {
    /// Create an idle machine; fails on an invalid polling config
    pub fn new(source: Arc<dyn StatusSource>, config: PollingConfig) -> Result<Self> {
        config.validate()?;
        let (snapshot, _) = watch::channel(PollingSnapshot::idle(0));
        Ok(Self {
            source,
            config,
            observer: None,
            snapshot: Arc::new(snapshot),
            session: None,
            next_session: 1,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Begin tracking `identifier`, cancelling any session in progress.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self, identifier: TransactionIdentifier) {
        self.stop();

        let session = self.next_session;
        self.next_session += 1;
        let previous = self
            .snapshot
            .send_replace(PollingSnapshot::pending(session, identifier.clone()));

        info!(
            "Tracking transaction {} (session {}, every {} ms, timeout {} ms)",
            identifier, session, self.config.poll_interval_ms, self.config.poll_timeout_ms
        );

        let timers = CancellationToken::new();
        let context = Arc::new(SessionContext {
            session,
            identifier: identifier.clone(),
            source: self.source.clone(),
            observer: self.observer.clone(),
            snapshot: self.snapshot.clone(),
            timers: timers.clone(),
        });

        if let Some(observer) = &self.observer {
            observer.on_transition(&identifier, previous.state, LifecycleState::Pending);
        }

        let ticker_context = context.clone();
        let ticker = ScheduledTask::repeating(self.config.poll_interval(), timers.clone(), move || {
            let context = ticker_context.clone();
            async move { context.poll_once().await }
        });

        let deadline_context = context.clone();
        let deadline = ScheduledTask::once(self.config.poll_timeout(), timers, move || async move {
            deadline_context.expire();
        });

        self.session = Some(PollingSession {
            context,
            _ticker: ticker,
            _deadline: deadline,
        });
    }

    /// Cancel the timers; the exposed state is left as it is
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            if session.is_live() {
                debug!("Stopped tracking {}", session.context.identifier);
            }
        }
    }

    /// Cancel the timers and return to `Idle`
    pub fn reset(&mut self) {
        self.stop();
        let session = self.next_session;
        self.next_session += 1;
        let previous = self.snapshot.send_replace(PollingSnapshot::idle(session));
        if let (Some(observer), Some(identifier)) = (&self.observer, &previous.identifier) {
            if previous.state != LifecycleState::Idle {
                observer.on_transition(identifier, previous.state, LifecycleState::Idle);
            }
        }
    }

    /// Whether timers are still running for the current session
    pub fn is_active(&self) -> bool {
        self.session.as_ref().map(PollingSession::is_live).unwrap_or(false)
    }

    pub fn state(&self) -> LifecycleState {
        self.snapshot.borrow().state
    }

    pub fn snapshot(&self) -> PollingSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receive every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<PollingSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    /// Wait until the current session reaches a terminal state.
    ///
    /// Returns the current snapshot straight away when nothing is running.
    pub async fn wait_for_terminal(&self) -> Result<PollingSnapshot> {
        if !self.is_active() {
            return Ok(self.snapshot());
        }
        let mut receiver = self.snapshot.subscribe();
        let snapshot = receiver
            .wait_for(|snapshot| snapshot.state.is_terminal())
            .await
            .map_err(|e| Error::Internal(format!("snapshot channel closed: {}", e)))?;
        Ok(snapshot.clone())
    }
}

impl PollingSnapshot {
    /// Outcome of a terminal snapshot as a `Result`
    pub fn outcome(&self, timeout_ms: u64) -> Result<StatusSample> {
        match (self.state, self.failure) {
            (LifecycleState::Finalized, _) => self
                .last_sample
                .clone()
                .ok_or_else(|| Error::Internal("finalized without a sample".to_string())),
            (LifecycleState::Failed, Some(FailureCause::TimedOut)) => {
                Err(Error::PollingTimeout { timeout_ms })
            }
            (LifecycleState::Failed, Some(FailureCause::ProbeFatal(kind))) => {
                Err(Error::Probe(ProbeError {
                    kind,
                    message: self.error.clone().unwrap_or_default(),
                }))
            }
            (LifecycleState::Failed, _) => Err(Error::TransactionFailure(
                self.error.clone().unwrap_or_default(),
            )),
            (state, _) => Err(Error::Internal(format!(
                "session not terminal (state {})",
                state
            ))),
        }
    }
}
