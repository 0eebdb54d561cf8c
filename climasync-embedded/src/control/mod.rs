mod hysteresis;
mod relay;

pub use hysteresis::*;
pub use relay::*;

use core::time::Duration;

use climasync_api::Setpoints;

#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Setpoints used until the store provides saved ones
    pub defaults: Setpoints,
    /// Period between two sensor reports
    pub report_interval: Duration,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            defaults: Setpoints::default(),
            report_interval: Duration::from_secs(10),
        }
    }
}
