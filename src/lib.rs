//! # Wallet Transaction Tracker
//!
//! Tracks a signed transaction from submission to finality.
//!
//! This crate provides:
//! - Transaction submission with a mandatory dry run before sending
//! - Single-shot status probing against a JSON-RPC ledger node
//! - A deterministic debug simulator that stands in for the ledger
//! - A polling state machine with timeout, cancellation and restart

#![warn(missing_docs, rust_2018_idioms)]
#![forbid(unsafe_code)]
#![allow(missing_docs)] // Internal implementation details

mod client;
mod config;
mod coordinator;
mod error;
mod lifecycle;
mod poller;
mod probe;
mod rpc;
mod schedule;
mod simulator;
mod submission;
mod types;

pub use client::JsonRpcLedgerClient;
pub use config::{PollingConfig, RpcConfig, TrackerConfig};
pub use coordinator::TransactionCoordinator;
pub use error::{Error, ProbeError, ProbeErrorKind, Result};
pub use lifecycle::{FailureCause, LifecycleState, PollingSnapshot, SessionStatistics};
pub use poller::{LifecycleObserver, PollingStateMachine, TIMED_OUT_REASON};
pub use probe::{StatusProber, StatusSource};
pub use rpc::{
    stringify_ledger_error, LedgerRpc, RawSignatureStatus, RpcError, SendOptions,
    SimulationOutcome,
};
pub use schedule::ScheduledTask;
pub use simulator::{sample_at, DebugSimulator, SimulationEntry, SimulationStore};
pub use submission::{decode_transaction, SubmissionHandler, SubmissionResult, SUBMISSION_COMMITMENT};
pub use types::{FinalityTier, StatusSample, TransactionIdentifier, SIGNATURE_LEN};
