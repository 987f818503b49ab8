//! Transaction lifecycle state
//!
//! Folds status samples into a monotonic lifecycle: a session only moves
//! forward through `Idle < Pending < Polling < Confirmed < Finalized`, except
//! that `Failed` may be entered from any non-terminal state.

use crate::error::ProbeErrorKind;
use crate::types::{FinalityTier, StatusSample, TransactionIdentifier};
use serde::Serialize;

/// Lifecycle state exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// No transaction being tracked
    Idle,

    /// Identifier known, nothing found on the ledger yet
    Pending,

    /// Seen on the ledger, not yet confirmed
    Polling,

    /// Reached the confirmed tier; still polling
    Confirmed,

    /// Reached the finalized tier
    Finalized,

    /// Rejected by the ledger, failed to probe fatally, or timed out
    Failed,
}

impl LifecycleState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Finalized | LifecycleState::Failed)
    }

    /// Check if this state indicates success
    pub fn is_successful(&self) -> bool {
        matches!(self, LifecycleState::Finalized)
    }

    /// Apply one sample.
    ///
    /// Only the finality tier and failure reason drive progression;
    /// confirmation counts are ignored.
    pub fn advance(self, sample: &StatusSample) -> LifecycleState {
        if self.is_terminal() {
            return self;
        }
        if sample.failure_reason.is_some() {
            return LifecycleState::Failed;
        }
        if !sample.found {
            return self;
        }

        let reached = match sample.finality_tier {
            Some(FinalityTier::Finalized) => LifecycleState::Finalized,
            Some(FinalityTier::Confirmed) => LifecycleState::Confirmed,
            Some(FinalityTier::Processed) | None => LifecycleState::Polling,
        };
        self.max(reached)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Idle => write!(f, "idle"),
            LifecycleState::Pending => write!(f, "pending"),
            LifecycleState::Polling => write!(f, "polling"),
            LifecycleState::Confirmed => write!(f, "confirmed"),
            LifecycleState::Finalized => write!(f, "finalized"),
            LifecycleState::Failed => write!(f, "failed"),
        }
    }
}

/// Why a session ended in [`LifecycleState::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// Ledger executed and rejected the transaction
    Rejected,

    /// Status could never be queried (e.g. malformed identifier)
    ProbeFatal(ProbeErrorKind),

    /// No terminal sample within the timeout
    TimedOut,
}

/// Probe counters for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatistics {
    /// Probes that returned a sample
    pub probes: u64,

    /// Probes that failed to return a sample
    pub probe_errors: u64,

    /// Samples reporting no ledger record
    pub not_found: u64,
}

impl SessionStatistics {
    pub fn attempts(&self) -> u64 {
        self.probes + self.probe_errors
    }

    /// Fraction of attempts that failed (0.0 to 1.0)
    pub fn error_rate(&self) -> f64 {
        let attempts = self.attempts();
        if attempts > 0 {
            self.probe_errors as f64 / attempts as f64
        } else {
            0.0
        }
    }
}

/// Caller-visible view of the current polling session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollingSnapshot {
    /// Increments on every `start`; stale results carry an older number
    pub session: u64,

    pub identifier: Option<TransactionIdentifier>,

    pub state: LifecycleState,

    /// Most recent sample applied
    pub last_sample: Option<StatusSample>,

    /// Latest probe error, or the failure reason once failed
    pub error: Option<String>,

    pub failure: Option<FailureCause>,

    pub statistics: SessionStatistics,
}

impl PollingSnapshot {
    pub fn idle(session: u64) -> Self {
        Self {
            session,
            identifier: None,
            state: LifecycleState::Idle,
            last_sample: None,
            error: None,
            failure: None,
            statistics: SessionStatistics::default(),
        }
    }

    pub fn pending(session: u64, identifier: TransactionIdentifier) -> Self {
        Self {
            identifier: Some(identifier),
            state: LifecycleState::Pending,
            ..Self::idle(session)
        }
    }

    /// Fold a sample in; returns the state before the sample
    pub fn apply_sample(&mut self, sample: StatusSample) -> LifecycleState {
        let previous = self.state;
        self.statistics.probes += 1;
        if !sample.found {
            self.statistics.not_found += 1;
        }
        self.state = previous.advance(&sample);
        if self.state == LifecycleState::Failed && previous != LifecycleState::Failed {
            self.error = sample.failure_reason.clone();
            self.failure = Some(FailureCause::Rejected);
        }
        self.last_sample = Some(sample);
        previous
    }

    /// Record a probe failure that did not produce a sample
    pub fn record_probe_error(&mut self, message: String) {
        self.statistics.probe_errors += 1;
        self.error = Some(message);
    }

    /// Force the failed state with a reason
    pub fn fail(&mut self, cause: FailureCause, reason: impl Into<String>) -> LifecycleState {
        let previous = self.state;
        self.state = LifecycleState::Failed;
        self.error = Some(reason.into());
        self.failure = Some(cause);
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(tier: FinalityTier, confirmations: u64) -> StatusSample {
        StatusSample::observed(tier, confirmations, 1)
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut state = LifecycleState::Pending;

        state = state.advance(&StatusSample::not_found());
        assert_eq!(state, LifecycleState::Pending);

        state = state.advance(&found(FinalityTier::Processed, 0));
        assert_eq!(state, LifecycleState::Polling);

        state = state.advance(&found(FinalityTier::Confirmed, 20));
        assert_eq!(state, LifecycleState::Confirmed);

        state = state.advance(&found(FinalityTier::Finalized, 40));
        assert_eq!(state, LifecycleState::Finalized);
        assert!(state.is_terminal());
        assert!(state.is_successful());
    }

    #[test]
    fn test_not_found_never_regresses() {
        for state in [LifecycleState::Polling, LifecycleState::Confirmed] {
            assert_eq!(state.advance(&StatusSample::not_found()), state);
        }
    }

    #[test]
    fn test_lower_tier_never_downgrades() {
        let state = LifecycleState::Confirmed.advance(&found(FinalityTier::Processed, 0));
        assert_eq!(state, LifecycleState::Confirmed);
    }

    #[test]
    fn test_confirmation_count_does_not_drive_progress() {
        let state = LifecycleState::Pending.advance(&found(FinalityTier::Processed, 1_000));
        assert_eq!(state, LifecycleState::Polling);

        let state = LifecycleState::Confirmed.advance(&found(FinalityTier::Confirmed, 2));
        assert_eq!(state, LifecycleState::Confirmed);
    }

    #[test]
    fn test_failure_overrides_any_non_terminal_state() {
        for state in [
            LifecycleState::Pending,
            LifecycleState::Polling,
            LifecycleState::Confirmed,
        ] {
            let next = state.advance(&StatusSample::failed("InsufficientFunds", Some(5)));
            assert_eq!(next, LifecycleState::Failed);
        }
    }

    #[test]
    fn test_terminal_states_absorb() {
        let finalized = LifecycleState::Finalized;
        assert_eq!(
            finalized.advance(&StatusSample::failed("late error", None)),
            LifecycleState::Finalized
        );

        let failed = LifecycleState::Failed;
        assert_eq!(
            failed.advance(&found(FinalityTier::Finalized, 40)),
            LifecycleState::Failed
        );
    }

    #[test]
    fn test_monotonic_over_arbitrary_sequence() {
        let samples = [
            found(FinalityTier::Confirmed, 18),
            StatusSample::not_found(),
            found(FinalityTier::Processed, 0),
            found(FinalityTier::Confirmed, 9),
            StatusSample::not_found(),
            found(FinalityTier::Finalized, 40),
            found(FinalityTier::Processed, 0),
        ];

        let mut state = LifecycleState::Pending;
        for sample in &samples {
            let next = state.advance(sample);
            assert!(next >= state, "{} regressed to {}", state, next);
            state = next;
        }
        assert_eq!(state, LifecycleState::Finalized);
    }

    #[test]
    fn test_snapshot_statistics() {
        let mut snapshot = PollingSnapshot::pending(1, TransactionIdentifier::from("abc"));
        snapshot.apply_sample(StatusSample::not_found());
        snapshot.record_probe_error("connection reset".to_string());
        snapshot.apply_sample(found(FinalityTier::Confirmed, 18));

        assert_eq!(snapshot.state, LifecycleState::Confirmed);
        assert_eq!(snapshot.statistics.probes, 2);
        assert_eq!(snapshot.statistics.not_found, 1);
        assert_eq!(snapshot.statistics.probe_errors, 1);
        assert_eq!(snapshot.statistics.attempts(), 3);
        assert_eq!(snapshot.error.as_deref(), Some("connection reset"));

        snapshot.apply_sample(StatusSample::failed("InsufficientFunds", Some(9)));
        assert_eq!(snapshot.state, LifecycleState::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("InsufficientFunds"));
        assert_eq!(snapshot.failure, Some(FailureCause::Rejected));
    }
}
