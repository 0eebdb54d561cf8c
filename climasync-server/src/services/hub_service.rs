use std::sync::Arc;
use std::time::Duration;

use climasync_api::{
    ByteChannel, Centi, ChannelError, ChannelStatus, Clock, DataPayload, Frame, HandshakeState,
    Inbound, Link, LinkPolicy, LogDeduplicator, Role, SetpointLimits, Setpoints,
};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::{RwLock, watch};
use tracing::Level;

use crate::errors::{ApiError, SetpointError};

/// Operator setpoint update on its way to the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetpointCommand {
    pub temperature: Centi,
    pub humidity: Centi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub channel: &'static str,
    pub handshake: &'static str,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            channel: ChannelStatus::Down.name(),
            handshake: HandshakeState::NotStarted.name(),
        }
    }
}

/// Everything the operator surface shows.
#[derive(Debug, Clone, Serialize)]
pub struct HubSnapshot {
    #[serde(flatten)]
    pub reading: Option<DataPayload>,
    /// RFC 3339 time the reading arrived
    pub received_at: Option<String>,
    /// Targets last acknowledged by the station
    pub setpoints: SetpointCommand,
    pub pending: Option<SetpointCommand>,
    pub link: LinkStatus,
    pub last_error: Option<String>,
}

impl Default for HubSnapshot {
    fn default() -> Self {
        let defaults = Setpoints::default();
        Self {
            reading: None,
            received_at: None,
            setpoints: SetpointCommand {
                temperature: defaults.temperature,
                humidity: defaults.humidity,
            },
            pending: None,
            link: LinkStatus::default(),
            last_error: None,
        }
    }
}

/// State shared between the station link task and the HTTP handlers.
pub struct HubService {
    state: RwLock<HubSnapshot>,
    commands: watch::Sender<Option<SetpointCommand>>,
    limits: SetpointLimits,
}

impl HubService {
    pub fn new(limits: SetpointLimits) -> (Arc<Self>, watch::Receiver<Option<SetpointCommand>>) {
        let (commands, receiver) = watch::channel(None);
        let service = Arc::new(Self {
            state: RwLock::new(HubSnapshot::default()),
            commands,
            limits,
        });

        (service, receiver)
    }

    pub async fn snapshot(&self) -> HubSnapshot {
        self.state.read().await.clone()
    }

    /// Validates and queues a setpoint pair. A newer submission replaces one
    /// that has not been sent yet.
    pub async fn submit_setpoints(
        &self,
        temperature: f64,
        humidity: f64,
    ) -> Result<SetpointCommand, ApiError> {
        let command = SetpointCommand {
            temperature: self
                .limits
                .temperature(temperature)
                .ok_or(SetpointError::InvalidTemperature(temperature))?,
            humidity: self
                .limits
                .humidity(humidity)
                .ok_or(SetpointError::InvalidHumidity(humidity))?,
        };

        let mut state = self.state.write().await;
        self.commands
            .send(Some(command))
            .map_err(|_| ApiError::InternalError("setpoint channel closed".into()))?;
        state.pending = Some(command);

        tracing::info!(
            "queued setpoints temp={} humidity={}",
            command.temperature,
            command.humidity
        );

        Ok(command)
    }

    async fn record_reading(&self, payload: DataPayload) {
        let mut state = self.state.write().await;
        state.reading = Some(payload);
        state.received_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
    }

    async fn record_link(&self, link: LinkStatus) {
        self.state.write().await.link = link;
    }

    async fn record_setpoints_applied(&self, command: SetpointCommand) {
        let mut state = self.state.write().await;
        state.setpoints = command;
        if state.pending == Some(command) {
            state.pending = None;
        }
    }

    async fn record_setpoints_dropped(&self, command: SetpointCommand, reason: String) {
        let mut state = self.state.write().await;
        if state.pending == Some(command) {
            state.pending = None;
        }
        state.last_error = Some(reason);
    }

    async fn record_error(&self, reason: String) {
        self.state.write().await.last_error = Some(reason);
    }
}

/// What one hub loop cycle ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubCycle {
    /// No station connected yet
    Waiting,
    /// Handshake did not complete this cycle
    Synchronizing,
    Idle,
    /// A setpoint update was acknowledged
    Forwarded,
    /// A setpoint update was dropped after exhausting its retries
    ForwardFailed,
}

/// Hub end of the station link.
pub struct HubLink<C, K> {
    link: Link<C, K>,
    service: Arc<HubService>,
    commands: watch::Receiver<Option<SetpointCommand>>,
    dedup: LogDeduplicator,
    reconnect_delay: Duration,
}

impl<C: ByteChannel, K: Clock> HubLink<C, K> {
    pub fn new(
        channel: C,
        clock: K,
        policy: LinkPolicy,
        service: Arc<HubService>,
        commands: watch::Receiver<Option<SetpointCommand>>,
    ) -> Self {
        Self {
            link: Link::new(channel, clock, Role::Hub, policy),
            service,
            commands,
            dedup: LogDeduplicator::new(),
            reconnect_delay: Duration::from_secs(1),
        }
    }

    pub async fn run(mut self) {
        loop {
            let outcome = self.tick().await;
            tracing::trace!("hub cycle ended: {:?}", outcome);

            let pause = self.link.policy().poll_interval;
            self.link.clock_mut().sleep(pause).await;
        }
    }

    /// One pass: drain inbound, keep a station connected and synchronized,
    /// then forward the newest queued setpoints.
    pub async fn tick(&mut self) -> HubCycle {
        if let Err(e) = self.link.pump().await {
            self.note(Level::WARN, &format!("station channel error: {}", e));
        }
        self.absorb_inbound().await;

        if !self.link.is_up() {
            let outcome = self.accept().await;
            self.publish_status().await;
            return outcome;
        }

        if !self.link.is_synchronized() {
            self.publish_status().await;
            let result = self.link.perform_handshake().await;
            self.absorb_inbound().await;

            if let Err(e) = result {
                self.note(Level::WARN, &format!("handshake failed: {}", e));
                self.link.disconnect().await;
                self.publish_status().await;
                return HubCycle::Synchronizing;
            }
            self.note(Level::INFO, "station synchronized");
        }

        let outcome = self.forward_setpoints().await;
        self.absorb_inbound().await;
        self.publish_status().await;
        outcome
    }

    async fn accept(&mut self) -> HubCycle {
        match self.link.connect().await {
            Ok(()) => self.note(Level::INFO, "station connected"),
            Err(ChannelError::Timeout(_)) => self.note(Level::DEBUG, "waiting for station"),
            Err(e) => {
                self.note(Level::WARN, &format!("accepting station failed: {}", e));
                let delay = self.reconnect_delay;
                self.link.clock_mut().sleep(delay).await;
            }
        }
        HubCycle::Waiting
    }

    async fn forward_setpoints(&mut self) -> HubCycle {
        if !self.commands.has_changed().unwrap_or(false) {
            return HubCycle::Idle;
        }
        let queued = *self.commands.borrow_and_update();
        let Some(command) = queued else {
            return HubCycle::Idle;
        };

        let frame = Frame::setpoints(command.temperature, command.humidity);
        let attempts = self.link.policy().delivery.max_attempts;

        match self.link.send_with_ack(frame, attempts).await {
            Ok(()) => {
                tracing::info!(
                    "station applied setpoints temp={} humidity={}",
                    command.temperature,
                    command.humidity
                );
                self.service.record_setpoints_applied(command).await;
                HubCycle::Forwarded
            }
            Err(e) => {
                let reason = format!("setpoint update dropped: {}", e);
                self.note(Level::WARN, &reason);
                self.service.record_setpoints_dropped(command, reason).await;
                HubCycle::ForwardFailed
            }
        }
    }

    async fn absorb_inbound(&mut self) {
        while let Some(inbound) = self.link.take_inbound() {
            match inbound {
                Inbound::Data(payload) => {
                    tracing::debug!(
                        "station reading temp={} humidity={} lux={}",
                        payload.temperature,
                        payload.humidity,
                        payload.lux
                    );
                    self.service.record_reading(payload).await;
                }
                Inbound::Setpoints { .. } => {
                    self.note(Level::WARN, "ignoring setpoints sent by station");
                }
                Inbound::PeerError(e) => {
                    let reason = format!("station reported error: {}", e.reason());
                    self.note(Level::WARN, &reason);
                    self.service.record_error(reason).await;
                }
            }
        }
    }

    async fn publish_status(&self) {
        self.service
            .record_link(LinkStatus {
                channel: self.link.status().name(),
                handshake: self.link.handshake_state().name(),
            })
            .await;
    }

    fn note(&mut self, level: Level, message: &str) {
        if !self.dedup.admit(message) {
            return;
        }
        match level {
            Level::ERROR => tracing::error!("{}", message),
            Level::WARN => tracing::warn!("{}", message),
            Level::INFO => tracing::info!("{}", message),
            _ => tracing::debug!("{}", message),
        }
    }

    pub fn link(&self) -> &Link<C, K> {
        &self.link
    }
}
