use core::time::Duration;

/// Bounded retry budget for one acknowledged exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    /// How long each attempt waits for the peer's answer
    pub per_attempt_timeout: Duration,
    /// Pause between a timed-out attempt and the next one
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const HANDSHAKE: Self = Self {
        max_attempts: 5,
        per_attempt_timeout: Duration::from_secs(3),
        backoff: Duration::from_secs(2),
    };

    pub const DELIVERY: Self = Self {
        max_attempts: 3,
        per_attempt_timeout: Duration::from_secs(2),
        backoff: Duration::from_secs(1),
    };

    pub const fn new(max_attempts: u8, per_attempt_timeout: Duration, backoff: Duration) -> Self {
        Self {
            max_attempts,
            per_attempt_timeout,
            backoff,
        }
    }

    pub fn with_max_attempts(self, max_attempts: u8) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self
        }
    }

    /// Worst-case time spent before giving up.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.max_attempts.max(1) as u32;
        self.per_attempt_timeout * attempts + self.backoff * (attempts - 1)
    }
}
