use std::time::Duration;

/// Retry pacing for transient remote failures.
///
/// Delays double per attempt up to `cap`, then a deterministic jitter
/// factor spreads concurrent retriers apart. The jitter is a pure
/// function of `(seed, attempt)` so a replayed run waits the same
/// amount of time, which keeps tests exact.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub cap: Duration,
    /// Attempts before the failure is reported as exhausted.
    pub max_attempts: u32,
    /// Jitter amplitude, as a fraction of the computed delay.
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            cap: Duration::from_secs(30),
            max_attempts: 5,
            jitter: 0.2,
        }
    }
}

impl BackoffPolicy {
    /// Preset for batch polling: patient, with a gentle cadence.
    #[must_use]
    pub fn polling() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(20),
            max_attempts: 60,
            jitter: 0.1,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32, seed: u64) -> Duration {
        let attempt = attempt.max(1);
        let exponent = (attempt - 1).min(31);
        let raw = self.base.saturating_mul(2u32.saturating_pow(exponent));
        let capped = raw.min(self.cap);
        if self.jitter <= 0.0 {
            return capped;
        }
        let unit = mix64(seed ^ u64::from(attempt)) as f64 / u64::MAX as f64;
        let factor = 1.0 + self.jitter * (2.0 * unit - 1.0);
        capped.mul_f64(factor.max(0.0))
    }

    /// Like [`Self::delay`], but a server-provided `Retry-After` hint
    /// overrides the computed schedule.
    #[must_use]
    pub fn delay_with_hint(
        &self,
        attempt: u32,
        seed: u64,
        retry_after: Option<Duration>,
    ) -> Duration {
        retry_after.unwrap_or_else(|| self.delay(attempt, seed))
    }

    /// True while more retries are allowed after `attempt` failures.
    #[must_use]
    pub const fn attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

// splitmix64 finalizer. std's DefaultHasher is randomly seeded per
// process, which would make delays differ between runs.
fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
