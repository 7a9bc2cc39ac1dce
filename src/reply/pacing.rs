//! Loop pacing: jittered waits, consecutive-failure tracking, cancellable sleeps.

use crate::config::PacingConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timing knobs shared by the poll loop and the broadcast loop.
#[derive(Debug, Clone)]
pub struct LoopPacing {
    pub jitter_ratio: f64,
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl From<&PacingConfig> for LoopPacing {
    fn from(config: &PacingConfig) -> Self {
        Self {
            jitter_ratio: config.jitter_ratio,
            failure_threshold: config.failure_threshold.max(1),
            cooldown: config.cooldown(),
        }
    }
}

impl Default for LoopPacing {
    fn default() -> Self {
        Self::from(&PacingConfig::default())
    }
}

/// Stretch `base` by a random factor in `[1, 1 + jitter_ratio]`.
///
/// Never shorter than `base`, so a configured delay is a floor.
pub fn jittered(base: Duration, jitter_ratio: f64) -> Duration {
    if base.is_zero() || jitter_ratio <= 0.0 {
        return base;
    }
    let spread = base.as_secs_f64() * jitter_ratio.min(1.0) * rand::random::<f64>();
    Duration::try_from_secs_f64(spread)
        .map_or(Duration::MAX, |extra| base.saturating_add(extra))
}

/// Sleep for `duration` unless `cancel` fires first.
///
/// Returns `false` when cancelled.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if duration.is_zero() {
        tokio::task::yield_now().await;
        return !cancel.is_cancelled();
    }
    tokio::select! {
        () = tokio::time::sleep(duration) => true,
        () = cancel.cancelled() => false,
    }
}

/// Counter of consecutive loop-iteration failures.
#[derive(Debug, Clone)]
pub struct FailureStreak {
    count: u32,
    threshold: u32,
}

impl FailureStreak {
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Whether the streak has reached the cooldown threshold.
    pub fn needs_cooldown(&self) -> bool {
        self.count >= self.threshold
    }

    /// Count one more failure and return the new streak length.
    pub fn record_failure(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}
