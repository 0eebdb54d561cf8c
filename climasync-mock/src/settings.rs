use std::error::Error;
use std::time::Duration;

use climasync_embedded::StationConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hub {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub report_interval_secs: u64,
    pub cycle_interval_ms: u64,
    pub reconnect_delay_secs: u64,
    pub day_length_secs: u64,
}

impl Station {
    pub fn config(&self) -> StationConfig {
        let mut config = StationConfig::default();
        config.control.report_interval = Duration::from_secs(self.report_interval_secs);
        config.cycle_interval = Duration::from_millis(self.cycle_interval_ms);
        config.reconnect_delay = Duration::from_secs(self.reconnect_delay_secs);
        config
    }

    pub fn day_length(&self) -> Duration {
        Duration::from_secs(self.day_length_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub hub: Hub,
    pub station: Station,
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let settings: Settings = toml::from_str(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../",
            "configs/mock.toml"
        )))?;

        Ok(settings)
    }
}
