//! Cancellable scheduled tasks
//!
//! A [`ScheduledTask`] owns a spawned timer loop. Dropping it cancels the
//! loop, so a session that owns its tasks cannot leak timers.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Shortest period a repeating task will tick at
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A repeating or one-shot task cancelled on drop.
///
/// Cancellation is cooperative: a tick already running is allowed to finish,
/// but no further tick starts.
#[derive(Debug)]
pub struct ScheduledTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `tick` now and then every `period` until it breaks or is cancelled.
    ///
    /// A tick is awaited before the next one is scheduled; late ticks are
    /// delayed rather than bunched up. A zero period is raised to 1 ms.
    pub fn repeating<F, Fut>(period: Duration, cancel: CancellationToken, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                if token.is_cancelled() || tick().await.is_break() {
                    break;
                }
            }
        });
        Self { cancel, handle }
    }

    /// Run `task` once after `delay` unless cancelled first
    pub fn once<F, Fut>(delay: Duration, cancel: CancellationToken, task: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => task().await,
            }
        });
        Self { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
