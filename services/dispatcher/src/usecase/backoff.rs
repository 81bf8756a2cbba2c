use chrono::{DateTime, Duration, Utc};

/// Exponential retry delay: `min(base * 2^retry_count, cap)` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_secs: u64,
    pub cap_secs: u64,
}

impl BackoffPolicy {
    pub fn new(base_secs: u64, cap_secs: u64) -> Self {
        Self {
            base_secs,
            cap_secs,
        }
    }

    /// Delay in seconds before retry number `retry_count`. Saturates at the cap.
    pub fn delay_secs(&self, retry_count: u32) -> u64 {
        let factor = 2u64.checked_pow(retry_count).unwrap_or(u64::MAX);
        self.base_secs.saturating_mul(factor).min(self.cap_secs)
    }

    pub fn delay(&self, retry_count: i32) -> Duration {
        let secs = self.delay_secs(retry_count.max(0).unsigned_abs());
        i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// `true` while a failed event last attempted at `last_attempt` must still wait.
    pub fn in_window(
        &self,
        retry_count: i32,
        last_attempt: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        now.signed_duration_since(last_attempt) < self.delay(retry_count)
    }
}
