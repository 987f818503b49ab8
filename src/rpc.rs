//! Ledger RPC contract
//!
//! The three calls the tracker needs from a ledger node, and the wire shapes of
//! their results.

use crate::types::{FinalityTier, TransactionIdentifier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure talking to the ledger node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// Request never produced a JSON-RPC response
    #[error("transport error: {0}")]
    Transport(String),

    /// Node answered with a JSON-RPC error object
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// Result of a dry-run execution
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    /// Ledger execution error, if the dry run failed
    #[serde(default)]
    pub err: Option<Value>,

    /// Instruction logs
    #[serde(default)]
    pub logs: Option<Vec<String>>,

    #[serde(default)]
    pub units_consumed: Option<u64>,
}

/// Options for `sendTransaction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub preflight_commitment: FinalityTier,
}

/// Raw entry of a `getSignatureStatuses` result
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSignatureStatus {
    pub slot: u64,

    /// `null` once the transaction is rooted
    #[serde(default)]
    pub confirmations: Option<u64>,

    #[serde(default)]
    pub err: Option<Value>,

    #[serde(default)]
    pub confirmation_status: Option<String>,
}

/// Ledger node operations used by the tracker
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Dry-run a signed transaction against current ledger state
    async fn simulate_transaction(&self, tx: &[u8]) -> Result<SimulationOutcome, RpcError>;

    /// Queue a signed transaction; returns once the node accepts it
    async fn send_transaction(
        &self,
        tx: &[u8],
        options: &SendOptions,
    ) -> Result<TransactionIdentifier, RpcError>;

    /// Current status of one transaction; `None` when the node has no record
    async fn get_signature_status(
        &self,
        identifier: &TransactionIdentifier,
    ) -> Result<Option<RawSignatureStatus>, RpcError>;
}

/// Render a ledger error value as a reason string.
///
/// Bare strings pass through verbatim; structured errors are compact JSON.
pub fn stringify_ledger_error(err: &Value) -> String {
    match err {
        Value::String(reason) => reason.clone(),
        other => other.to_string(),
    }
}
