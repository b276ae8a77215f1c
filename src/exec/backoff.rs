// src/exec/backoff.rs

use std::time::Duration;

use crate::types::BackoffStrategy;

/// Delay between a failed attempt and the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub strategy: BackoffStrategy,
    /// Delay after the first failure.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    pub fn exponential(base: Duration, max_delay: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base,
            max_delay,
        }
    }

    pub fn linear(base: Duration, max_delay: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Linear,
            base,
            max_delay,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.strategy {
            BackoffStrategy::Linear => self.base.saturating_mul(attempt),
            BackoffStrategy::Exponential => {
                // Shifts past 31 saturate.
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }

    /// Sum of the delays that precede retries `1..=retries`.
    pub fn total_delay(&self, retries: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Linear => self.linear_total(retries),
            BackoffStrategy::Exponential => {
                let mut total = Duration::ZERO;
                let mut previous = None;
                for attempt in 1..=retries {
                    let delay = self.delay_for(attempt);
                    // Doubling stalls only once capped or saturated.
                    if previous == Some(delay) {
                        let remaining = retries - attempt + 1;
                        return total.saturating_add(delay.saturating_mul(remaining));
                    }
                    total = total.saturating_add(delay);
                    previous = Some(delay);
                }
                total
            }
        }
    }

    fn linear_total(&self, retries: u32) -> Duration {
        let base = self.base.as_nanos();
        let cap = self.max_delay.as_nanos();
        if base == 0 || cap == 0 {
            return Duration::ZERO;
        }

        let n = u128::from(retries);
        // Attempts whose delay is still below the cap.
        let below_cap = ((cap - 1) / base).min(n);
        let ramp = base.saturating_mul(below_cap * (below_cap + 1) / 2);
        let capped = cap.saturating_mul(n - below_cap);
        duration_from_nanos(ramp.saturating_add(capped))
    }
}

fn duration_from_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = nanos / NANOS_PER_SEC;
    match u64::try_from(secs) {
        Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
        Err(_) => Duration::MAX,
    }
}
