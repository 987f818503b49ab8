//! Error types for transaction tracking

use serde::Serialize;
use thiserror::Error;

/// Tracker error type
#[derive(Error, Debug)]
pub enum Error {
    /// Signed transaction blob could not be decoded
    #[error("Transaction decode failed: {0}")]
    Decode(String),

    /// Ledger rejected the transaction during the dry run
    #[error("Transaction simulation failed: {reason}")]
    Simulation {
        /// Stringified ledger execution error
        reason: String,
        /// Instruction logs reported by the ledger
        logs: Vec<String>,
    },

    /// Node rejected the send call, or could not be reached before sending
    #[error("Transaction submission failed: {0}")]
    Submission(String),

    /// Status query could not be performed
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Ledger executed and rejected the transaction
    #[error("Transaction failed: {0}")]
    TransactionFailure(String),

    /// No terminal status observed in the polling window
    #[error("Transaction polling timed out after {timeout_ms} ms")]
    PollingTimeout { timeout_ms: u64 },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether resubmitting a fresh signed transaction could succeed
    pub fn is_resubmittable(&self) -> bool {
        matches!(
            self,
            Error::Submission(_) | Error::PollingTimeout { .. } | Error::Probe(_)
        )
    }
}

/// Classification of a failed status query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    /// Network or node trouble; the next tick may succeed
    Transport,

    /// The node answered with an RPC error
    Rpc { code: i64 },

    /// The identifier can never be looked up
    InvalidIdentifier,
}

/// A status query that produced no sample
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Status probe failed: {message}")]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub message: String,
}

/// JSON-RPC "invalid params"
const RPC_INVALID_PARAMS: i64 = -32602;

impl ProbeError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ProbeErrorKind::Transport,
            message: message.into(),
        }
    }

    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self {
            kind: ProbeErrorKind::Rpc { code },
            message: message.into(),
        }
    }

    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self {
            kind: ProbeErrorKind::InvalidIdentifier,
            message: message.into(),
        }
    }

    /// Fatal errors end the polling session instead of being retried
    pub fn is_fatal(&self) -> bool {
        match self.kind {
            ProbeErrorKind::Transport => false,
            ProbeErrorKind::Rpc { code } => code == RPC_INVALID_PARAMS,
            ProbeErrorKind::InvalidIdentifier => true,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
