use core::time::Duration;

use climasync_api::Clock;
use embassy_time::{Instant, Timer};

/// Converts a `core` duration into an embassy one, saturating at the tick range.
pub fn to_embassy(duration: Duration) -> embassy_time::Duration {
    embassy_time::Duration::from_micros(duration.as_micros().min(u64::MAX as u128) as u64)
}

#[derive(Debug, Clone)]
pub struct EmbassyClock {
    boot_instant: Instant,
}

impl EmbassyClock {
    pub fn new() -> Self {
        Self {
            boot_instant: Instant::now(),
        }
    }
}

impl Default for EmbassyClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for EmbassyClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.boot_instant.elapsed().as_micros())
    }

    async fn sleep(&mut self, duration: Duration) {
        Timer::after(to_embassy(duration)).await;
    }
}
