use crate::error::{HarnessError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Production tick between two readiness checks.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Result of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The predicate held at the given tick (1-based).
    Succeeded { ticks: u64 },
    /// The predicate never held; `elapsed` is the time spent ticking.
    TimedOut { elapsed: Duration },
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Succeeded { .. })
    }

    /// Ticks taken on success, [`HarnessError::TimedOut`] otherwise.
    pub fn into_result(self) -> Result<u64> {
        match self {
            PollOutcome::Succeeded { ticks } => Ok(ticks),
            PollOutcome::TimedOut { elapsed } => Err(HarnessError::TimedOut { elapsed }),
        }
    }
}

/// Bounded retry-with-sleep.
///
/// Every iteration sleeps one tick, bumps the tick counter, then evaluates the
/// predicate. The wait gives up once the counter exceeds `timeout`, so a
/// predicate that never holds is evaluated exactly `timeout + 1` times.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    tick: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self { tick: DEFAULT_TICK }
    }
}

impl Poller {
    pub fn with_tick(tick: Duration) -> Self {
        Self { tick }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Polls `predicate` until it returns `true` or `timeout` ticks have
    /// passed. Predicate errors are returned as-is.
    pub async fn poll_until<F, Fut>(&self, mut predicate: F, timeout: u64) -> Result<PollOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let mut ticks: u64 = 0;
        loop {
            sleep(self.tick).await;
            ticks += 1;

            if predicate().await? {
                debug!("condition met after {} tick(s)", ticks);
                return Ok(PollOutcome::Succeeded { ticks });
            }

            if ticks > timeout {
                let elapsed = self.tick * u32::try_from(ticks).unwrap_or(u32::MAX);
                debug!("condition not met after {} tick(s)", ticks);
                return Ok(PollOutcome::TimedOut { elapsed });
            }
        }
    }
}
