//! Randomized pacing between navigations and scrolls.
//!
//! Cooperative only: delays are drawn up front and never adapt to throttling
//! signals from the remote site.

use rand::Rng;
use tokio::time::Duration;

/// Base delay plus uniform jitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pace {
    pub base: Duration,
    pub jitter: Duration,
}

impl Pace {
    pub const fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    pub const fn fixed(base: Duration) -> Self {
        Self::new(base, Duration::ZERO)
    }

    pub fn from_millis(base_ms: u64, jitter_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(jitter_ms))
    }

    /// Draw one delay in `[base, base + jitter]`
    pub fn sample(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base;
        }
        self.base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Suspend the calling task for `base + random(0, jitter)`
pub async fn delay(pace: Pace) {
    let wait = pace.sample();
    if !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
}

/// Pacing points of a scrape run; scroll pacing lives in the scroll policy
#[derive(Debug, Clone, Copy)]
pub struct PacingPlan {
    /// After the search page loads
    pub initial: Pace,
    /// Before each listing navigation
    pub listing: Pace,
}

impl PacingPlan {
    /// No waiting at all
    #[cfg(test)]
    pub const fn immediate() -> Self {
        Self {
            initial: Pace::fixed(Duration::ZERO),
            listing: Pace::fixed(Duration::ZERO),
        }
    }
}

impl Default for PacingPlan {
    fn default() -> Self {
        Self {
            initial: Pace::fixed(Duration::from_millis(3000)),
            listing: Pace::from_millis(1000, 1200),
        }
    }
}
