//! Main transaction coordinator
//!
//! Wires configuration, submission, status probing (or simulation in debug
//! mode) and polling together behind one entry point.

use crate::client::JsonRpcLedgerClient;
use crate::config::TrackerConfig;
use crate::poller::{LifecycleObserver, PollingStateMachine};
use crate::probe::{StatusProber, StatusSource};
use crate::rpc::LedgerRpc;
use crate::simulator::{DebugSimulator, SimulationStore};
use crate::submission::{SubmissionHandler, SubmissionResult};
use crate::types::{StatusSample, TransactionIdentifier};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Transaction coordinator
///
/// Manages the complete flow for a signed transaction:
/// 1. Simulation and submission
/// 2. Status lookup against the ledger or the debug simulator
/// 3. Polling sessions that track the transaction to a terminal state
pub struct TransactionCoordinator {
    /// Configuration
    config: TrackerConfig,

    /// Submission handler
    submission_handler: SubmissionHandler,

    /// Prober in production, simulator in debug mode
    status_source: Arc<dyn StatusSource>,
}

impl TransactionCoordinator {
    /// Create a coordinator over an existing ledger client
    pub fn new(config: TrackerConfig, rpc: Arc<dyn LedgerRpc>) -> Result<Self> {
        Self::with_simulation_store(config, rpc, Arc::new(SimulationStore::new()))
    }

    /// Create a coordinator whose debug simulator uses `store`
    pub fn with_simulation_store(
        config: TrackerConfig,
        rpc: Arc<dyn LedgerRpc>,
        store: Arc<SimulationStore>,
    ) -> Result<Self> {
        config.validate()?;

        let status_source: Arc<dyn StatusSource> = if config.debug_mode {
            info!("Transaction coordinator running in debug mode");
            Arc::new(DebugSimulator::new(store))
        } else {
            Arc::new(StatusProber::new(rpc.clone()))
        };

        Ok(Self {
            config,
            submission_handler: SubmissionHandler::new(rpc),
            status_source,
        })
    }

    /// Create a coordinator talking JSON-RPC to the configured endpoint
    pub fn connect(config: TrackerConfig) -> Result<Self> {
        let client = JsonRpcLedgerClient::new(&config.rpc)?;
        debug!("Ledger endpoint: {}", client.endpoint());
        Self::new(config, Arc::new(client))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn is_debug(&self) -> bool {
        self.config.debug_mode
    }

    /// Submit a signed transaction without tracking it
    pub async fn submit(&self, encoded: &str) -> Result<SubmissionResult> {
        self.submission_handler
            .submit_transaction(encoded, self.config.debug_mode)
            .await
    }

    /// Take a single status sample
    pub async fn lookup_status(&self, identifier: &TransactionIdentifier) -> Result<StatusSample> {
        Ok(self.status_source.sample(identifier).await?)
    }

    /// A polling state machine over this coordinator's status source
    pub fn new_poller(&self) -> Result<PollingStateMachine> {
        PollingStateMachine::new(self.status_source.clone(), self.config.polling.clone())
    }

    /// A polling state machine that reports to `observer`
    pub fn new_observed_poller(
        &self,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Result<PollingStateMachine> {
        Ok(self.new_poller()?.with_observer(observer))
    }

    /// Submit and start tracking on `poller`.
    ///
    /// Submission errors are returned before any session starts.
    pub async fn submit_and_track(
        &self,
        poller: &mut PollingStateMachine,
        encoded: &str,
    ) -> Result<SubmissionResult> {
        let submission = self.submit(encoded).await?;
        poller.start(submission.identifier.clone());
        Ok(submission)
    }

    /// Submit and wait for the transaction to finalize, fail, or time out
    pub async fn track_to_completion(&self, encoded: &str) -> Result<StatusSample> {
        let mut poller = self.new_poller()?;
        self.submit_and_track(&mut poller, encoded).await?;
        let snapshot = poller.wait_for_terminal().await?;
        snapshot.outcome(self.config.polling.poll_timeout_ms)
    }
}
