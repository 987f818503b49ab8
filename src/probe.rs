//! Status probing
//!
//! A [`StatusSource`] answers "what does the ledger say about this transaction
//! right now". [`StatusProber`] does so with exactly one RPC call per sample.

use crate::error::ProbeError;
use crate::rpc::{stringify_ledger_error, LedgerRpc, RawSignatureStatus, RpcError};
use crate::types::{FinalityTier, StatusSample, TransactionIdentifier};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Anything that can produce a point-in-time status sample
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn sample(&self, identifier: &TransactionIdentifier) -> Result<StatusSample, ProbeError>;
}

/// Queries the ledger for a single transaction's status
pub struct StatusProber {
    rpc: Arc<dyn LedgerRpc>,
}

impl StatusProber {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self { rpc }
    }

    /// Map a raw ledger status into a sample
    pub fn map_status(raw: Option<RawSignatureStatus>) -> StatusSample {
        let Some(raw) = raw else {
            return StatusSample::not_found();
        };

        if let Some(err) = &raw.err {
            return StatusSample::failed(stringify_ledger_error(err), Some(raw.slot));
        }

        let tier = match raw.confirmation_status.as_deref() {
            // raw "processed" is the lower bound of the confirmed tier
            Some("processed") => FinalityTier::Confirmed,
            Some(commitment) => FinalityTier::from_commitment(commitment).unwrap_or_else(|| {
                warn!("Unknown commitment {:?}, treating as processed", commitment);
                FinalityTier::Processed
            }),
            // rooted transactions report neither a status nor a depth
            None if raw.confirmations.is_none() => FinalityTier::Finalized,
            None => FinalityTier::Processed,
        };

        StatusSample::observed(tier, raw.confirmations.unwrap_or(0), raw.slot)
    }
}

impl From<RpcError> for ProbeError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Transport(message) => ProbeError::transport(message),
            RpcError::Rpc { code, message } => ProbeError::rpc(code, message),
        }
    }
}

#[async_trait]
impl StatusSource for StatusProber {
    async fn sample(&self, identifier: &TransactionIdentifier) -> Result<StatusSample, ProbeError> {
        if !identifier.is_well_formed() {
            return Err(ProbeError::invalid_identifier(format!(
                "{} is not a valid transaction signature",
                identifier
            )));
        }

        let raw = self.rpc.get_signature_status(identifier).await?;
        let sample = Self::map_status(raw);
        debug!(
            "Probed {}: found={} tier={:?} confirmations={:?}",
            identifier, sample.found, sample.finality_tier, sample.confirmations
        );
        Ok(sample)
    }
}
