use std::time::Duration;

use climasync_api::Clock;
use tokio::time::Instant;

/// Monotonic clock on the tokio timer.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_advances_now() {
        let mut clock = TokioClock::new();
        let before = clock.now();

        clock.sleep(Duration::from_millis(20)).await;

        assert!(clock.now() - before >= Duration::from_millis(20));
    }
}
