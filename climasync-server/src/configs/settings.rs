use std::env;
use std::time::Duration;

use climasync_api::{LinkPolicy, RetryPolicy, SetpointLimits};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Retry {
    pub max_attempts: u8,
    pub timeout_ms: u64,
    pub backoff_ms: u64,
}

impl From<Retry> for RetryPolicy {
    fn from(retry: Retry) -> Self {
        RetryPolicy::new(
            retry.max_attempts,
            Duration::from_millis(retry.timeout_ms),
            Duration::from_millis(retry.backoff_ms),
        )
        .with_max_attempts(retry.max_attempts)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub host: String,
    pub port: u16,
    /// How long one accept call waits for the station before the loop moves on
    pub accept_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub frame_capacity: usize,
    pub handshake: Retry,
    pub delivery: Retry,
}

impl Link {
    pub fn policy(&self) -> LinkPolicy {
        LinkPolicy {
            handshake: self.handshake.into(),
            delivery: self.delivery.into(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            frame_capacity: self.frame_capacity,
            limits: SetpointLimits::default(),
        }
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub logger: Logger,
    pub link: Link,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());

        Config::builder()
            .add_source(File::with_name("configs/default"))
            .add_source(File::with_name(&format!("configs/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("HUB").separator("__"))
            .build()?
            .try_deserialize()
    }
}
