//! Transaction submission handler
//!
//! Decodes a signed transaction, dry-runs it against the ledger, and only then
//! sends it. Returns as soon as the node has queued the transaction; tracking
//! it to finality is the caller's job.

use crate::rpc::{stringify_ledger_error, LedgerRpc, RpcError, SendOptions};
use crate::types::{FinalityTier, TransactionIdentifier};
use crate::{Error, Result};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Commitment requested for preflight metadata on submission
pub const SUBMISSION_COMMITMENT: FinalityTier = FinalityTier::Finalized;

/// Result of transaction submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    /// Ledger-assigned identifier
    pub identifier: TransactionIdentifier,

    /// Submission timestamp (Unix milliseconds)
    pub timestamp: u64,

    /// Whether the identifier was synthesized in debug mode
    pub is_synthetic: bool,

    /// Compute units consumed by the dry run
    pub units_consumed: Option<u64>,
}

impl SubmissionResult {
    /// Create a new submission result
    pub fn new(identifier: TransactionIdentifier, timestamp: u64, is_synthetic: bool) -> Self {
        Self {
            identifier,
            timestamp,
            is_synthetic,
            units_consumed: None,
        }
    }
}

/// Transaction submission handler
///
/// Simulates every transaction before sending it so that transactions certain
/// to fail never cost fees.
pub struct SubmissionHandler {
    rpc: Arc<dyn LedgerRpc>,

    /// Current time provider (for testing)
    current_time_fn: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl SubmissionHandler {
    /// Create a new submission handler
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self {
            rpc,
            current_time_fn: Box::new(|| {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0)
            }),
        }
    }

    /// Set the current time function (for testing)
    pub fn with_time_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.current_time_fn = Box::new(f);
        self
    }

    /// Submit a base64-encoded signed transaction
    ///
    /// 1. Decode the payload
    /// 2. Dry-run it; abort on any execution error
    /// 3. Send with preflight disabled
    ///
    /// With `debug` set nothing is decoded or sent; a unique identifier is
    /// synthesized instead.
    pub async fn submit_transaction(&self, encoded: &str, debug: bool) -> Result<SubmissionResult> {
        let timestamp = (self.current_time_fn)();

        if debug {
            let identifier = TransactionIdentifier::synthetic();
            info!("Debug mode: synthesized transaction {}", identifier);
            return Ok(SubmissionResult::new(identifier, timestamp, true));
        }

        let start = std::time::Instant::now();

        // Step 1: Decode
        let tx = decode_transaction(encoded)?;
        debug!("Decoded transaction ({} bytes)", tx.len());

        // Step 2: Simulate
        let outcome = self.rpc.simulate_transaction(&tx).await.map_err(|e| {
            warn!("Simulation request failed: {}", e);
            Error::Submission(format!("simulation request failed: {}", e))
        })?;

        if let Some(err) = &outcome.err {
            let reason = stringify_ledger_error(err);
            let logs = outcome.logs.clone().unwrap_or_default();
            warn!("Simulation rejected transaction: {} ({} log lines)", reason, logs.len());
            return Err(Error::Simulation { reason, logs });
        }
        debug!("Simulation passed, units consumed: {:?}", outcome.units_consumed);

        // Step 3: Send
        let options = SendOptions {
            skip_preflight: true,
            preflight_commitment: SUBMISSION_COMMITMENT,
        };
        let identifier = self
            .rpc
            .send_transaction(&tx, &options)
            .await
            .map_err(|e| {
                warn!("Send failed: {}", e);
                match e {
                    RpcError::Rpc { code, message } => {
                        Error::Submission(format!("node rejected transaction ({}): {}", code, message))
                    }
                    RpcError::Transport(message) => Error::Submission(message),
                }
            })?;

        info!(
            "Transaction {} submitted in {:?}",
            identifier,
            start.elapsed()
        );

        let mut result = SubmissionResult::new(identifier, timestamp, false);
        result.units_consumed = outcome.units_consumed;
        Ok(result)
    }
}

/// Decode a base64 signed transaction
pub fn decode_transaction(encoded: &str) -> Result<Vec<u8>> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::Decode(format!("invalid base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(Error::Decode("empty transaction".to_string()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::tests::MockLedger;
    use crate::rpc::SimulationOutcome;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    const SIGNED_TX: &str = "AQIDBAUGBwg=";

    fn handler(ledger: &Arc<MockLedger>) -> SubmissionHandler {
        SubmissionHandler::new(ledger.clone()).with_time_fn(|| 1_700_000_000_000)
    }

    #[tokio::test]
    async fn test_submit_simulates_then_sends() {
        let ledger = Arc::new(MockLedger::default());
        *ledger.send.lock().unwrap() = Some(Ok(TransactionIdentifier::from("sig-1")));
        *ledger.simulation.lock().unwrap() = Some(Ok(SimulationOutcome {
            units_consumed: Some(4_200),
            ..Default::default()
        }));

        let result = handler(&ledger).submit_transaction(SIGNED_TX, false).await.unwrap();

        assert_eq!(result.identifier.as_str(), "sig-1");
        assert_eq!(result.timestamp, 1_700_000_000_000);
        assert!(!result.is_synthetic);
        assert_eq!(result.units_consumed, Some(4_200));
        assert_eq!(ledger.simulate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 1);

        let options = ledger.last_send_options.lock().unwrap().clone().unwrap();
        assert!(options.skip_preflight);
        assert_eq!(options.preflight_commitment, FinalityTier::Finalized);
    }

    #[tokio::test]
    async fn test_simulation_error_never_sends() {
        let ledger = Arc::new(MockLedger::default());
        *ledger.simulation.lock().unwrap() = Some(Ok(SimulationOutcome {
            err: Some(json!({ "InstructionError": [1, { "Custom": 6001 }] })),
            logs: Some(vec![
                "Program JUP6 invoke [1]".to_string(),
                "Program log: slippage tolerance exceeded".to_string(),
            ]),
            units_consumed: Some(31_000),
        }));

        let err = handler(&ledger)
            .submit_transaction(SIGNED_TX, false)
            .await
            .unwrap_err();

        match err {
            Error::Simulation { reason, logs } => {
                assert_eq!(reason, r#"{"InstructionError":[1,{"Custom":6001}]}"#);
                assert_eq!(logs.len(), 2);
            }
            other => panic!("expected simulation error, got {:?}", other),
        }
        assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_decode_error_touches_nothing() {
        let ledger = Arc::new(MockLedger::default());

        for bad in ["not base64 !!", "", "   "] {
            let err = handler(&ledger).submit_transaction(bad, false).await.unwrap_err();
            assert!(matches!(err, Error::Decode(_)), "{:?}", err);
        }
        assert_eq!(ledger.simulate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_rejection_is_submission_error() {
        let ledger = Arc::new(MockLedger::default());
        *ledger.send.lock().unwrap() = Some(Err(RpcError::Rpc {
            code: -32002,
            message: "Blockhash not found".to_string(),
        }));

        let err = handler(&ledger)
            .submit_transaction(SIGNED_TX, false)
            .await
            .unwrap_err();

        assert!(matches!(&err, Error::Submission(m) if m.contains("Blockhash not found")));
        assert!(err.is_resubmittable());
    }

    #[tokio::test]
    async fn test_unreachable_simulation_is_submission_error() {
        let ledger = Arc::new(MockLedger::default());
        *ledger.simulation.lock().unwrap() =
            Some(Err(RpcError::Transport("connection refused".to_string())));

        let err = handler(&ledger)
            .submit_transaction(SIGNED_TX, false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Submission(_)));
        assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_debug_mode_bypasses_ledger() {
        let ledger = Arc::new(MockLedger::default());
        let handler = handler(&ledger);

        let first = handler.submit_transaction("garbage", true).await.unwrap();
        let second = handler.submit_transaction("garbage", true).await.unwrap();

        assert!(first.is_synthetic);
        assert_ne!(first.identifier, second.identifier);
        assert!(first.identifier.is_well_formed());
        assert_eq!(ledger.simulate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 0);
    }
}
