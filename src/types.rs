//! Core tracker types
//!
//! Transaction identifiers, finality tiers and the status samples produced by
//! probing the ledger.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Length in bytes of a ledger transaction signature
pub const SIGNATURE_LEN: usize = 64;

/// Ledger-assigned transaction identifier (base58 transaction signature)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionIdentifier(String);

static SYNTHETIC_COUNTER: AtomicU64 = AtomicU64::new(0);

impl TransactionIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this decodes to a full-length signature
    pub fn is_well_formed(&self) -> bool {
        bs58::decode(&self.0)
            .into_vec()
            .map(|bytes| bytes.len() == SIGNATURE_LEN)
            .unwrap_or(false)
    }

    /// Synthesize a well-formed identifier that is unique within the process.
    ///
    /// The leading bytes carry a process-wide counter and the rest is random,
    /// so two calls never collide even if the random source repeats.
    pub fn synthetic() -> Self {
        let sequence = SYNTHETIC_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; SIGNATURE_LEN];
        rand::thread_rng().fill(&mut bytes[8..]);
        bytes[..8].copy_from_slice(&sequence.to_be_bytes());
        Self(bs58::encode(bytes).into_string())
    }
}

impl std::fmt::Display for TransactionIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TransactionIdentifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TransactionIdentifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// How irreversible a transaction's inclusion is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalityTier {
    /// Seen by the queried node
    Processed,

    /// Voted on by a supermajority
    Confirmed,

    /// Rooted; cannot be rolled back
    Finalized,
}

impl FinalityTier {
    /// Parse a ledger commitment string
    pub fn from_commitment(value: &str) -> Option<Self> {
        match value {
            "processed" => Some(FinalityTier::Processed),
            "confirmed" => Some(FinalityTier::Confirmed),
            "finalized" => Some(FinalityTier::Finalized),
            _ => None,
        }
    }

    pub fn as_commitment(&self) -> &'static str {
        match self {
            FinalityTier::Processed => "processed",
            FinalityTier::Confirmed => "confirmed",
            FinalityTier::Finalized => "finalized",
        }
    }
}

impl std::fmt::Display for FinalityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_commitment())
    }
}

/// Point-in-time view of a transaction on the ledger.
///
/// Samples are not cumulative. Confirmation counts are display data only and
/// may go down between samples when a different node answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSample {
    /// Whether the ledger has any record of the transaction
    pub found: bool,

    /// Confirmation depth reported by the ledger
    pub confirmations: Option<u64>,

    /// Finality tier reached (absent when not found or failed)
    pub finality_tier: Option<FinalityTier>,

    /// Ledger execution error; terminal when set
    pub failure_reason: Option<String>,

    /// Slot the status was observed at
    pub slot: Option<u64>,
}

impl StatusSample {
    /// No record on the ledger yet
    pub fn not_found() -> Self {
        Self {
            found: false,
            confirmations: None,
            finality_tier: None,
            failure_reason: None,
            slot: None,
        }
    }

    /// Executed and rejected by the ledger
    pub fn failed(reason: impl Into<String>, slot: Option<u64>) -> Self {
        Self {
            found: true,
            confirmations: None,
            finality_tier: None,
            failure_reason: Some(reason.into()),
            slot,
        }
    }

    /// Included at the given tier
    pub fn observed(tier: FinalityTier, confirmations: u64, slot: u64) -> Self {
        Self {
            found: true,
            confirmations: Some(confirmations),
            finality_tier: Some(tier),
            failure_reason: None,
            slot: Some(slot),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure_reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_synthetic_identifiers_are_unique_and_well_formed() {
        let ids: HashSet<_> = (0..256).map(|_| TransactionIdentifier::synthetic()).collect();
        assert_eq!(ids.len(), 256);
        assert!(ids.iter().all(TransactionIdentifier::is_well_formed));
    }

    #[test]
    fn test_malformed_identifiers() {
        assert!(!TransactionIdentifier::from("").is_well_formed());
        assert!(!TransactionIdentifier::from("0OIl").is_well_formed());
        // valid base58, wrong length
        assert!(!TransactionIdentifier::from("3yZe7d").is_well_formed());
    }

    #[test]
    fn test_finality_tier_ordering() {
        assert!(FinalityTier::Processed < FinalityTier::Confirmed);
        assert!(FinalityTier::Confirmed < FinalityTier::Finalized);
        assert_eq!(
            FinalityTier::from_commitment("confirmed"),
            Some(FinalityTier::Confirmed)
        );
        assert_eq!(FinalityTier::from_commitment("recent"), None);
    }

    #[test]
    fn test_sample_serializes_with_lowercase_tier() {
        let sample = StatusSample::observed(FinalityTier::Finalized, 40, 1234);
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["finality_tier"], "finalized");
        assert_eq!(json["confirmations"], 40);
    }
}
