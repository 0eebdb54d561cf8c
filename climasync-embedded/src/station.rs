use core::fmt::Debug;
use core::time::Duration;

use alloc::format;

use climasync_api::{
    ByteChannel, Clock, DataPayload, Frame, Inbound, Link, LinkPolicy, LogDeduplicator, Role,
    SensorSnapshot,
};
use embedded_hal::digital::OutputPin;
use log::{Level, debug, error, info, log, warn};

use crate::control::{AutomationController, ControlConfig, RelayBank};
use crate::sensor::SensorSource;
use crate::storage::{Credentials, SetpointStore};

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub control: ControlConfig,
    pub link: LinkPolicy,
    /// Used when the store holds no credentials
    pub default_credentials: Credentials,
    /// Pause after a failed connection attempt
    pub reconnect_delay: Duration,
    /// Period of the active link check
    pub probe_interval: Duration,
    /// Pause between two loop cycles
    pub cycle_interval: Duration,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            link: LinkPolicy::default(),
            default_credentials: Credentials::new("ClimaSync", "climasync"),
            reconnect_delay: Duration::from_secs(5),
            probe_interval: Duration::from_secs(30),
            cycle_interval: Duration::from_millis(100),
        }
    }
}

/// What one loop cycle ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Channel was down; a connection attempt was made
    Reconnecting,
    /// Handshake did not complete this cycle
    Synchronizing,
    /// Nothing was due
    Idle,
    Reported,
    /// Report was dropped after exhausting its retries
    ReportFailed,
}

/// Loads WiFi credentials, seeding the store with `defaults` when it is empty.
pub async fn load_credentials<T>(store: &mut T, defaults: &Credentials) -> Credentials
where
    T: SetpointStore,
    T::Error: Debug,
{
    match store.load_credentials().await {
        Ok(Some(credentials)) => credentials,
        Ok(None) => {
            info!("No stored credentials, using defaults");
            if let Err(e) = store.save_credentials(defaults).await {
                warn!("Failed to persist default credentials: {:?}", e);
            }
            defaults.clone()
        }
        Err(e) => {
            warn!("Failed to read credentials: {:?}", e);
            defaults.clone()
        }
    }
}

/// Sensor-side synchronization loop.
pub struct Station<C, K, S, T, P>
where
    C: ByteChannel,
    K: Clock,
    S: SensorSource,
    T: SetpointStore,
    P: OutputPin,
{
    link: Link<C, K>,
    sensors: S,
    store: T,
    relays: RelayBank<P>,
    automation: AutomationController,
    config: StationConfig,
    dedup: LogDeduplicator,
    last_report: Option<Duration>,
    last_probe: Duration,
    last_snapshot: Option<SensorSnapshot>,
}

impl<C, K, S, T, P> Station<C, K, S, T, P>
where
    C: ByteChannel,
    K: Clock,
    S: SensorSource,
    T: SetpointStore,
    T::Error: Debug,
    P: OutputPin,
{
    pub fn new(
        channel: C,
        clock: K,
        sensors: S,
        store: T,
        relays: RelayBank<P>,
        config: StationConfig,
    ) -> Self {
        let link = Link::new(channel, clock, Role::Station, config.link);
        Self {
            link,
            sensors,
            store,
            relays,
            automation: AutomationController::new(config.control.defaults),
            config,
            dedup: LogDeduplicator::new(),
            last_report: None,
            last_probe: Duration::ZERO,
            last_snapshot: None,
        }
    }

    /// Restores saved setpoints and switches every relay off.
    pub async fn boot(&mut self) {
        match self.store.load_setpoints().await {
            Ok(Some((temperature, humidity))) => {
                self.automation.set_setpoints(temperature, humidity);
                info!("Restored setpoints temp={} humidity={}", temperature, humidity);
            }
            Ok(None) => info!("No stored setpoints, using defaults"),
            Err(e) => warn!("Failed to load setpoints: {:?}", e),
        }

        if let Err(e) = self.relays.release() {
            error!("{}", e);
        }
    }

    pub async fn run(&mut self) -> ! {
        self.boot().await;

        loop {
            let outcome = self.tick().await;
            debug!("Cycle ended: {:?}", outcome);

            let pause = self.config.cycle_interval;
            self.link.clock_mut().sleep(pause).await;
        }
    }

    /// One pass of the loop: drain inbound, keep the link up and synchronized,
    /// then report when due.
    pub async fn tick(&mut self) -> CycleOutcome {
        if let Err(e) = self.link.pump().await {
            self.note(Level::Warn, &format!("Channel error: {}", e));
        }
        self.apply_inbound().await;

        if !self.link.is_up() {
            return self.reconnect().await;
        }

        if !self.link.is_synchronized() {
            if let Err(e) = self.link.perform_handshake().await {
                self.note(Level::Warn, &format!("Handshake failed: {}", e));
                // a spent handshake budget is only reset by a fresh connection
                self.link.disconnect().await;
                return CycleOutcome::Synchronizing;
            }
        }

        let now = self.link.clock().now();
        if now.saturating_sub(self.last_probe) >= self.config.probe_interval {
            self.last_probe = now;
            if !self.link.probe().await {
                self.note(Level::Warn, "Link probe failed");
                return CycleOutcome::Reconnecting;
            }
        }

        let due = self
            .last_report
            .is_none_or(|last| now.saturating_sub(last) >= self.config.control.report_interval);
        if !due {
            return CycleOutcome::Idle;
        }

        self.last_report = Some(now);
        let outcome = self.report().await;
        self.apply_inbound().await;
        outcome
    }

    async fn reconnect(&mut self) -> CycleOutcome {
        self.note(Level::Info, "Connecting to hub");

        match self.link.connect().await {
            Ok(()) => {
                self.last_probe = self.link.clock().now();
                self.note(Level::Info, "Connected to hub");
            }
            Err(e) => {
                self.note(Level::Warn, &format!("Connection failed: {}", e));
                let delay = self.config.reconnect_delay;
                self.link.clock_mut().sleep(delay).await;
            }
        }
        CycleOutcome::Reconnecting
    }

    async fn report(&mut self) -> CycleOutcome {
        let taken_at = self.link.clock().now().as_millis() as u64;
        let snapshot = self.sensors.snapshot(taken_at);
        let actuators = self.automation.update(&snapshot);
        if let Err(e) = self.relays.apply(&actuators) {
            error!("{}", e);
        }
        self.last_snapshot = Some(snapshot);

        let frame = match Frame::data(&DataPayload::new(&snapshot, &actuators)) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode sensor report: {}", e);
                return CycleOutcome::ReportFailed;
            }
        };

        let attempts = self.config.link.delivery.max_attempts;
        match self.link.send_with_ack(frame, attempts).await {
            Ok(()) => {
                self.note(
                    Level::Info,
                    &format!(
                        "Reported temp={} humidity={} lux={}",
                        snapshot.temperature, snapshot.humidity, snapshot.lux
                    ),
                );
                CycleOutcome::Reported
            }
            Err(e) => {
                self.note(Level::Warn, &format!("Report dropped: {}", e));
                CycleOutcome::ReportFailed
            }
        }
    }

    async fn apply_inbound(&mut self) {
        while let Some(inbound) = self.link.take_inbound() {
            match inbound {
                Inbound::Setpoints {
                    temperature,
                    humidity,
                } => {
                    self.automation.set_setpoints(temperature, humidity);
                    info!("Setpoints updated temp={} humidity={}", temperature, humidity);

                    if let Err(e) = self.store.save_setpoints(temperature, humidity).await {
                        warn!("Failed to persist setpoints: {:?}", e);
                    }
                }
                Inbound::Data(payload) => debug!("Hub data: {:?}", payload),
                Inbound::PeerError(e) => self.note(Level::Warn, &format!("Hub error: {}", e.reason())),
            }
        }
    }

    fn note(&mut self, level: Level, message: &str) {
        if self.dedup.admit(message) {
            log!(level, "{}", message);
        }
    }

    pub fn link(&self) -> &Link<C, K> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut Link<C, K> {
        &mut self.link
    }

    pub fn automation(&self) -> &AutomationController {
        &self.automation
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn last_snapshot(&self) -> Option<&SensorSnapshot> {
        self.last_snapshot.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;
    use core::convert::Infallible;

    use alloc::collections::VecDeque;
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::vec::Vec;

    use climasync_api::{Centi, ChannelError, HandshakeState};
    use embedded_hal::digital::ErrorType;

    use crate::storage::{EepromStore, MemoryEeprom};

    use super::*;

    /// Hub end of the link: answers readiness and, optionally, data.
    #[derive(Default)]
    struct HubPeer {
        up: bool,
        ack_data: bool,
        silent: bool,
        unreachable: bool,
        rx: VecDeque<u8>,
        partial: Vec<u8>,
        lines: Vec<String>,
    }

    impl ByteChannel for HubPeer {
        async fn connect(&mut self) -> Result<(), ChannelError> {
            self.up = true;
            Ok(())
        }

        fn is_up(&self) -> bool {
            self.up
        }

        async fn send(&mut self, bytes: &[u8]) -> Result<usize, ChannelError> {
            for &byte in bytes {
                if byte != b'\n' {
                    self.partial.push(byte);
                    continue;
                }
                let line = String::from_utf8(core::mem::take(&mut self.partial)).unwrap();
                if line.starts_with("HANDSHAKE:") && !self.silent {
                    self.rx.extend(b"HANDSHAKE:ESP32_READY\n");
                } else if line.starts_with("DATA:") && self.ack_data {
                    self.rx.extend(b"ACK\n");
                }
                self.lines.push(line);
            }
            Ok(bytes.len())
        }

        async fn poll_incoming(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
            let n = buf.len().min(self.rx.len());
            for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }

        async fn disconnect(&mut self) -> Result<(), ChannelError> {
            self.up = false;
            Ok(())
        }

        async fn probe(&mut self) -> Result<bool, ChannelError> {
            Ok(self.up && !self.unreachable)
        }
    }

    #[derive(Default)]
    struct VirtualClock {
        now: Duration,
    }

    impl Clock for VirtualClock {
        fn now(&self) -> Duration {
            self.now
        }

        async fn sleep(&mut self, duration: Duration) {
            self.now += duration;
        }
    }

    struct FixedSensors {
        temperature: i16,
        humidity: i16,
    }

    impl SensorSource for FixedSensors {
        fn read_temperature(&mut self) -> i16 {
            self.temperature
        }

        fn read_humidity(&mut self) -> i16 {
            self.humidity
        }

        fn read_lux(&mut self) -> u16 {
            420
        }
    }

    #[derive(Clone, Default)]
    struct MockPin {
        states: Rc<RefCell<Vec<bool>>>,
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
            self.states.borrow_mut().push(false);
            Ok(())
        }

        fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
            self.states.borrow_mut().push(true);
            Ok(())
        }
    }

    type TestStation =
        Station<HubPeer, VirtualClock, FixedSensors, EepromStore<MemoryEeprom>, MockPin>;

    fn station(ack_data: bool, heater: MockPin) -> TestStation {
        let peer = HubPeer {
            ack_data,
            ..Default::default()
        };
        station_with(peer, heater)
    }

    fn station_with(peer: HubPeer, heater: MockPin) -> TestStation {
        let sensors = FixedSensors {
            temperature: 2350,
            humidity: 5500,
        };
        let store = EepromStore::new(MemoryEeprom::new(128));
        let relays = RelayBank::new(heater, MockPin::default(), false);

        Station::new(
            peer,
            VirtualClock::default(),
            sensors,
            store,
            relays,
            StationConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_connect_handshake_then_report() {
        let heater = MockPin::default();
        let mut station = station(true, heater.clone());
        station.boot().await;

        assert_eq!(station.tick().await, CycleOutcome::Reconnecting);
        assert!(station.link().is_up());
        assert_eq!(station.link().handshake_state(), HandshakeState::NotStarted);

        assert_eq!(station.tick().await, CycleOutcome::Reported);
        assert!(station.link().is_synchronized());

        let lines = &station.link().channel().lines;
        assert_eq!(lines[0], "HANDSHAKE:ARDUINO_READY");
        assert!(lines[1].starts_with("DATA:{\"temperature\":23.5,\"humidity\":55.0,\"lux\":420"));
        assert!(lines[1].ends_with("\"heater\":true,\"dehumidifier\":true}"));

        assert_eq!(heater.states.borrow().as_slice(), &[false, true]);
        assert_eq!(station.tick().await, CycleOutcome::Idle);
    }

    #[tokio::test]
    async fn test_report_period() {
        let mut station = station(true, MockPin::default());
        station.tick().await;
        station.tick().await;

        station
            .link_mut()
            .clock_mut()
            .sleep(Duration::from_secs(10))
            .await;
        assert_eq!(station.tick().await, CycleOutcome::Reported);
    }

    #[tokio::test]
    async fn test_remote_setpoints_applied_and_saved() {
        let mut station = station(true, MockPin::default());
        station.tick().await;
        station.tick().await;

        station
            .link_mut()
            .channel_mut()
            .rx
            .extend(b"temp=22.5&humidity=45.25\n");
        assert_eq!(station.tick().await, CycleOutcome::Idle);

        let setpoints = station.automation().setpoints();
        assert_eq!(setpoints.temperature, Centi(2250));
        assert_eq!(setpoints.humidity, Centi(4525));
        assert_eq!(
            station.link().channel().lines.last().map(String::as_str),
            Some("SETPOINTS_ACK")
        );

        assert_eq!(
            station.store.load_setpoints().await,
            Ok(Some((Centi(2250), Centi(4525))))
        );
    }

    #[tokio::test]
    async fn test_boot_restores_saved_setpoints() {
        let mut station = station(true, MockPin::default());
        station
            .store
            .save_setpoints(Centi(2100), Centi(6000))
            .await
            .unwrap();

        station.boot().await;
        assert_eq!(station.automation().setpoints().temperature, Centi(2100));
        assert_eq!(station.automation().setpoints().humidity, Centi(6000));
    }

    #[tokio::test]
    async fn test_unacknowledged_report_is_dropped() {
        let mut station = station(false, MockPin::default());
        station.tick().await;

        assert_eq!(station.tick().await, CycleOutcome::ReportFailed);
        assert!(station.link().is_synchronized());

        let data_lines = station
            .link()
            .channel()
            .lines
            .iter()
            .filter(|line| line.starts_with("DATA:"))
            .count();
        assert_eq!(data_lines, 3);
    }

    #[tokio::test]
    async fn test_silent_hub_forces_reconnect() {
        let peer = HubPeer {
            ack_data: true,
            silent: true,
            ..Default::default()
        };
        let mut station = station_with(peer, MockPin::default());

        assert_eq!(station.tick().await, CycleOutcome::Reconnecting);
        assert_eq!(station.tick().await, CycleOutcome::Synchronizing);
        assert!(!station.link().is_up());
        assert_eq!(station.link().handshake_state(), HandshakeState::NotStarted);

        let handshakes = station
            .link()
            .channel()
            .lines
            .iter()
            .filter(|line| line.as_str() == "HANDSHAKE:ARDUINO_READY")
            .count();
        assert_eq!(handshakes, 5);

        assert_eq!(station.tick().await, CycleOutcome::Reconnecting);
        assert!(station.link().is_up());
        assert_eq!(station.link().handshake_state(), HandshakeState::NotStarted);

        station.link_mut().channel_mut().silent = false;
        assert_eq!(station.tick().await, CycleOutcome::Reported);
        assert!(station.link().is_synchronized());
    }

    #[tokio::test]
    async fn test_failed_link_check_forces_reconnect() {
        let mut station = station(true, MockPin::default());
        station.tick().await;
        assert_eq!(station.tick().await, CycleOutcome::Reported);

        station.link_mut().channel_mut().unreachable = true;
        station
            .link_mut()
            .clock_mut()
            .sleep(StationConfig::default().probe_interval)
            .await;

        assert_eq!(station.tick().await, CycleOutcome::Reconnecting);
        assert!(!station.link().is_up());
        assert!(!station.link().is_synchronized());

        station.link_mut().channel_mut().unreachable = false;
        assert_eq!(station.tick().await, CycleOutcome::Reconnecting);
        assert!(station.link().is_up());
        assert_eq!(station.link().handshake_state(), HandshakeState::NotStarted);
    }

    #[tokio::test]
    async fn test_credentials_default_when_store_empty() {
        let mut store = EepromStore::new(MemoryEeprom::new(128));
        let defaults = Credentials::new("ap", "pw");

        assert_eq!(load_credentials(&mut store, &defaults).await, defaults);
        assert_eq!(store.load_credentials().await, Ok(Some(defaults)));
    }
}
