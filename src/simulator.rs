//! Deterministic status simulation for debug mode
//!
//! Stands in for [`StatusProber`](crate::probe::StatusProber) when no ledger is
//! available. Each identifier walks through a fixed schedule measured from the
//! first time it was sampled:
//!
//! | elapsed      | sample                                 |
//! |--------------|----------------------------------------|
//! | `< 2s`       | not found                              |
//! | `2s .. 4s`   | processed, 0 confirmations             |
//! | `4s .. 8s`   | confirmed, 15 to 30 confirmations      |
//! | `>= 8s`      | finalized, 40 confirmations            |

use crate::error::ProbeError;
use crate::probe::StatusSource;
use crate::types::{FinalityTier, StatusSample, TransactionIdentifier};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

const PROPAGATION_MS: u64 = 2_000;
const CONFIRMING_MS: u64 = 4_000;
const FINALIZING_MS: u64 = 8_000;
const MIN_CONFIRMED_DEPTH: u64 = 15;
const CONFIRMED_DEPTH_SPAN: u64 = 16;
const FINALIZED_DEPTH: u64 = 40;
const SLOT_MS: u64 = 400;

/// Per-identifier simulation memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationEntry {
    /// Clock reading at the first sample (milliseconds)
    pub first_seen_ms: u64,

    /// Number of samples taken so far
    pub calls: u64,
}

/// Shared simulation memory, injected into every simulator that should see
/// the same identifiers
#[derive(Debug, Default)]
pub struct SimulationStore {
    entries: DashMap<TransactionIdentifier, SimulationEntry>,
}

impl SimulationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample and return the updated entry
    fn touch(&self, identifier: &TransactionIdentifier, now_ms: u64) -> SimulationEntry {
        let mut entry = self
            .entries
            .entry(identifier.clone())
            .or_insert(SimulationEntry {
                first_seen_ms: now_ms,
                calls: 0,
            });
        entry.calls += 1;
        *entry
    }

    pub fn call_count(&self, identifier: &TransactionIdentifier) -> u64 {
        self.entries.get(identifier).map(|e| e.calls).unwrap_or(0)
    }

    /// Drop an identifier so its schedule starts over
    pub fn forget(&self, identifier: &TransactionIdentifier) -> bool {
        self.entries.remove(identifier).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Simulated sample for a given elapsed time; pure
pub fn sample_at(elapsed_ms: u64) -> StatusSample {
    let slot = elapsed_ms / SLOT_MS;
    if elapsed_ms < PROPAGATION_MS {
        StatusSample::not_found()
    } else if elapsed_ms < CONFIRMING_MS {
        StatusSample::observed(FinalityTier::Processed, 0, slot)
    } else if elapsed_ms < FINALIZING_MS {
        let progress = (elapsed_ms - CONFIRMING_MS) * CONFIRMED_DEPTH_SPAN
            / (FINALIZING_MS - CONFIRMING_MS);
        StatusSample::observed(FinalityTier::Confirmed, MIN_CONFIRMED_DEPTH + progress, slot)
    } else {
        StatusSample::observed(FinalityTier::Finalized, FINALIZED_DEPTH, slot)
    }
}

/// Debug-mode status source
pub struct DebugSimulator {
    store: Arc<SimulationStore>,

    /// Current time provider (milliseconds)
    current_time_fn: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl DebugSimulator {
    pub fn new(store: Arc<SimulationStore>) -> Self {
        let origin = tokio::time::Instant::now();
        Self {
            store,
            current_time_fn: Box::new(move || origin.elapsed().as_millis() as u64),
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

    pub fn store(&self) -> &Arc<SimulationStore> {
        &self.store
    }
}

#[async_trait]
impl StatusSource for DebugSimulator {
    async fn sample(&self, identifier: &TransactionIdentifier) -> Result<StatusSample, ProbeError> {
        let now = (self.current_time_fn)();
        let entry = self.store.touch(identifier, now);
        let elapsed = now.saturating_sub(entry.first_seen_ms);
        let sample = sample_at(elapsed);

        debug!(
            "Simulated {} call {} at +{}ms: found={} tier={:?}",
            identifier, entry.calls, elapsed, sample.found, sample.finality_tier
        );
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn manual_clock() -> (Arc<AtomicU64>, impl Fn() -> u64 + Send + Sync + 'static) {
        let now = Arc::new(AtomicU64::new(1_000_000));
        let reader = now.clone();
        (now, move || reader.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_schedule_at_checkpoints() {
        let (now, clock) = manual_clock();
        let simulator = DebugSimulator::new(Arc::new(SimulationStore::new())).with_time_fn(clock);
        let id = TransactionIdentifier::synthetic();

        // first call pins the origin
        assert!(!simulator.sample(&id).await.unwrap().found);

        now.fetch_add(1_000, Ordering::SeqCst);
        assert!(!simulator.sample(&id).await.unwrap().found);

        now.fetch_add(2_000, Ordering::SeqCst);
        let processed = simulator.sample(&id).await.unwrap();
        assert_eq!(processed.finality_tier, Some(FinalityTier::Processed));
        assert_eq!(processed.confirmations, Some(0));

        now.fetch_add(3_000, Ordering::SeqCst);
        let confirmed = simulator.sample(&id).await.unwrap();
        assert_eq!(confirmed.finality_tier, Some(FinalityTier::Confirmed));
        assert_eq!(confirmed.confirmations, Some(23));

        now.fetch_add(3_000, Ordering::SeqCst);
        let finalized = simulator.sample(&id).await.unwrap();
        assert_eq!(finalized.finality_tier, Some(FinalityTier::Finalized));
        assert_eq!(finalized.confirmations, Some(40));

        assert_eq!(simulator.store().call_count(&id), 5);
    }

    #[test]
    fn test_confirmed_depth_bounds() {
        for elapsed in (CONFIRMING_MS..FINALIZING_MS).step_by(7) {
            let depth = sample_at(elapsed).confirmations.unwrap();
            assert!((15..=31).contains(&depth), "depth {} at {}", depth, elapsed);
        }
        assert_eq!(sample_at(CONFIRMING_MS).confirmations, Some(15));
        assert_eq!(sample_at(FINALIZING_MS - 1).confirmations, Some(30));
    }

    #[test]
    fn test_schedule_boundaries() {
        assert!(!sample_at(1_999).found);
        assert_eq!(sample_at(2_000).finality_tier, Some(FinalityTier::Processed));
        assert_eq!(sample_at(4_000).finality_tier, Some(FinalityTier::Confirmed));
        assert_eq!(sample_at(8_000).finality_tier, Some(FinalityTier::Finalized));
        assert_eq!(sample_at(8_000), sample_at(8_000));
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let (now, clock) = manual_clock();
        let simulator = DebugSimulator::new(Arc::new(SimulationStore::new())).with_time_fn(clock);
        let early = TransactionIdentifier::synthetic();
        let late = TransactionIdentifier::synthetic();

        simulator.sample(&early).await.unwrap();
        now.fetch_add(9_000, Ordering::SeqCst);
        simulator.sample(&late).await.unwrap();

        let early_sample = simulator.sample(&early).await.unwrap();
        let late_sample = simulator.sample(&late).await.unwrap();
        assert_eq!(early_sample.finality_tier, Some(FinalityTier::Finalized));
        assert!(!late_sample.found);
    }

    #[tokio::test]
    async fn test_stores_are_isolated() {
        let (now, first_clock) = manual_clock();
        let reader = now.clone();
        let first = DebugSimulator::new(Arc::new(SimulationStore::new())).with_time_fn(first_clock);
        let second = DebugSimulator::new(Arc::new(SimulationStore::new()))
            .with_time_fn(move || reader.load(Ordering::SeqCst));
        let id = TransactionIdentifier::synthetic();

        first.sample(&id).await.unwrap();
        now.fetch_add(5_000, Ordering::SeqCst);

        assert!(first.sample(&id).await.unwrap().found);
        assert!(!second.sample(&id).await.unwrap().found);

        assert!(first.store().forget(&id));
        assert!(!first.sample(&id).await.unwrap().found);
    }
}
