mod channel;

pub use channel::{ByteChannel, ChannelStatus, Clock};

use core::time::Duration;

use alloc::collections::VecDeque;
use alloc::string::ToString;
use alloc::vec::Vec;

use log::{debug, info, warn};

use crate::error::{ChannelError, DeliveryError, FramingFault, HandshakeFailure};
use crate::frame::{AckToken, Frame, FrameCodec, ProtocolError, DEFAULT_FRAME_CAPACITY};
use crate::handshake::{Handshake, HandshakeEvent, HandshakeState};
use crate::models::{Centi, DataPayload, Role};
use crate::retry::RetryPolicy;
use crate::setpoint::{Accumulation, SetpointAccumulator, SetpointLimits};

const READ_CHUNK: usize = 64;
const MAX_READS_PER_PUMP: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPolicy {
    pub handshake: RetryPolicy,
    pub delivery: RetryPolicy,
    /// Sleep between two polls while waiting for an answer
    pub poll_interval: Duration,
    pub frame_capacity: usize,
    pub limits: SetpointLimits,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            handshake: RetryPolicy::HANDSHAKE,
            delivery: RetryPolicy::DELIVERY,
            poll_interval: Duration::from_millis(50),
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            limits: SetpointLimits::default(),
        }
    }
}

/// Application messages received and already acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Data(DataPayload),
    Setpoints { temperature: Centi, humidity: Centi },
    PeerError(ProtocolError),
}

#[derive(Debug)]
struct PendingSend {
    payload: Vec<u8>,
    attempts: u8,
    ack: AckToken,
    acked: bool,
}

/// Reliable messenger over one byte channel.
///
/// Owns the channel session: codec state, handshake and the single
/// outstanding send all live and die with the connection.
pub struct Link<C, K> {
    channel: C,
    clock: K,
    policy: LinkPolicy,
    status: ChannelStatus,
    codec: FrameCodec,
    handshake: Handshake,
    setpoints: SetpointAccumulator,
    pending: Option<PendingSend>,
    resync_requested: bool,
    inbox: VecDeque<Inbound>,
}

impl<C: ByteChannel, K: Clock> Link<C, K> {
    pub fn new(channel: C, clock: K, role: Role, policy: LinkPolicy) -> Self {
        Self {
            channel,
            clock,
            policy,
            status: ChannelStatus::Down,
            codec: FrameCodec::new(policy.frame_capacity),
            handshake: Handshake::new(role, policy.handshake),
            setpoints: SetpointAccumulator::new(policy.limits),
            pending: None,
            resync_requested: false,
            inbox: VecDeque::new(),
        }
    }

    pub async fn connect(&mut self) -> Result<(), ChannelError> {
        self.status = ChannelStatus::Connecting;
        self.reset_session();

        match self.channel.connect().await {
            Ok(()) => {
                self.status = ChannelStatus::Up;
                info!("{} link up", self.role().name());
                Ok(())
            }
            Err(e) => {
                self.mark_down();
                Err(e)
            }
        }
    }

    pub async fn disconnect(&mut self) {
        if let Err(e) = self.channel.disconnect().await {
            debug!("Error while closing channel: {}", e);
        }
        self.mark_down();
    }

    /// Verifies the channel with an active check; a failed check takes the link down.
    pub async fn probe(&mut self) -> bool {
        if self.status != ChannelStatus::Up {
            return false;
        }

        match self.channel.probe().await {
            Ok(true) => true,
            Ok(false) => {
                warn!("Link probe reports channel down");
                self.mark_down();
                false
            }
            Err(e) => {
                warn!("Link probe failed: {}", e);
                self.mark_down();
                false
            }
        }
    }

    /// Drains pending inbound bytes and dispatches every complete frame.
    /// Returns the number of frames dispatched.
    pub async fn pump(&mut self) -> Result<usize, ChannelError> {
        if self.status != ChannelStatus::Up {
            return Ok(0);
        }

        let mut buf = [0u8; READ_CHUNK];
        let mut dispatched = 0;

        for _ in 0..MAX_READS_PER_PUMP {
            let n = match self.channel.poll_incoming(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    warn!("Channel read failed: {}", e);
                    self.mark_down();
                    return Err(e);
                }
            };
            if n == 0 {
                break;
            }

            let decoded: Vec<_> = self.codec.feed(&buf[..n]).collect();
            for result in decoded {
                match result {
                    Ok(frame) => {
                        self.dispatch(frame).await?;
                        dispatched += 1;
                    }
                    Err(fault) => debug!("Discarding inbound line: {}", fault),
                }
            }
        }

        if !self.channel.is_up() {
            warn!("Channel dropped by peer");
            self.mark_down();
        }

        Ok(dispatched)
    }

    /// Runs the readiness exchange until it completes or the budget is spent.
    pub async fn perform_handshake(&mut self) -> Result<(), HandshakeFailure> {
        if self.status != ChannelStatus::Up {
            return Err(HandshakeFailure::ChannelDown);
        }

        match self.handshake.state() {
            HandshakeState::Completed => {
                self.resync_requested = false;
                return Ok(());
            }
            HandshakeState::Failed => return Err(HandshakeFailure::NeedsReconnect),
            _ => {}
        }

        let policy = self.policy.handshake;
        self.resync_requested = false;
        let mut frame = self.handshake.begin();

        loop {
            debug!(
                "Declaring readiness (attempt {}/{})",
                self.handshake.attempts(),
                policy.max_attempts
            );
            self.transmit(&frame).await?;

            let deadline = self.clock.now() + policy.per_attempt_timeout;
            if self.wait_until(deadline, |link| link.handshake.is_completed()).await? {
                self.resync_requested = false;
                info!("Handshake completed with {}", self.role().peer().name());
                return Ok(());
            }

            match self.handshake.on_timeout() {
                Some(next) => {
                    self.clock.sleep(policy.backoff).await;
                    frame = next;
                }
                None => {
                    let attempts = self.handshake.attempts();
                    warn!("Peer not ready after {} handshake attempts", attempts);
                    return Err(HandshakeFailure::Exhausted { attempts });
                }
            }
        }
    }

    /// Sends `frame` and waits for its matching acknowledgment, retrying up
    /// to `max_attempts` times. The payload is dropped on exhaustion.
    pub async fn send_with_ack(
        &mut self,
        frame: Frame,
        max_attempts: u8,
    ) -> Result<(), DeliveryError> {
        let Some(ack) = frame.expected_ack() else {
            return Err(DeliveryError::Unacknowledged);
        };
        if ack == AckToken::Handshake {
            return self.perform_handshake().await.map_err(DeliveryError::from);
        }

        if self.status != ChannelStatus::Up {
            return Err(DeliveryError::Channel(ChannelError::NotConnected));
        }
        if !self.handshake.is_completed() && !self.resync_requested {
            return Err(DeliveryError::NotSynchronized);
        }

        let result = self.deliver(frame.encode(), ack, max_attempts.max(1)).await;
        self.pending = None;
        result
    }

    async fn deliver(
        &mut self,
        payload: Vec<u8>,
        ack: AckToken,
        max_attempts: u8,
    ) -> Result<(), DeliveryError> {
        let policy = self.policy.delivery;
        self.pending = Some(PendingSend {
            payload,
            attempts: 0,
            ack,
            acked: false,
        });

        for attempt in 1..=max_attempts {
            if self.resync_requested {
                self.perform_handshake().await?;
            }

            let deadline = self.clock.now() + policy.per_attempt_timeout;
            let payload = match self.pending.as_mut() {
                Some(pending) => {
                    pending.attempts = attempt;
                    pending.acked = false;
                    pending.payload.clone()
                }
                None => return Err(DeliveryError::Channel(ChannelError::NotConnected)),
            };

            self.write_all(&payload).await?;

            self.wait_until(deadline, |link| {
                link.pending_acked() || link.resync_requested
            })
            .await?;
            if self.pending_acked() {
                debug!("Acknowledged after {} attempt(s)", attempt);
                return Ok(());
            }

            if attempt < max_attempts {
                warn!(
                    "No acknowledgment (attempt {}/{}), retrying",
                    attempt, max_attempts
                );
                self.clock.sleep(policy.backoff).await;
            }
        }

        Err(DeliveryError::Exhausted {
            attempts: max_attempts,
        })
    }

    /// Pumps until `done` holds or `deadline` passes. `Ok(false)` on timeout.
    async fn wait_until<F>(&mut self, deadline: Duration, done: F) -> Result<bool, ChannelError>
    where
        F: Fn(&Self) -> bool,
    {
        loop {
            self.pump().await?;
            if done(self) {
                return Ok(true);
            }
            if self.status != ChannelStatus::Up {
                return Err(ChannelError::NotConnected);
            }
            if self.clock.now() >= deadline {
                return Ok(false);
            }
            self.clock.sleep(self.policy.poll_interval).await;
        }
    }

    async fn dispatch(&mut self, frame: Frame) -> Result<(), ChannelError> {
        debug!("Received {} frame", frame.kind());

        if let (Some(token), Some(pending)) = (frame.acknowledges(), self.pending.as_mut()) {
            if pending.ack == token {
                pending.acked = true;
            }
        }

        if !matches!(frame, Frame::Setpoints(_)) && !self.setpoints.is_empty() {
            debug!("Discarding partial setpoint update");
            self.setpoints.clear();
        }

        match frame {
            Frame::Handshake(_) => {
                if let HandshakeEvent::Completed { reply: Some(reply) } =
                    self.handshake.on_frame(&frame)
                {
                    self.transmit(&reply).await?;
                }
            }
            Frame::Data(body) => {
                if !self.handshake.is_completed() {
                    warn!("Data received before handshake");
                    return self.transmit(&Frame::Error(ProtocolError::HandshakeFailed)).await;
                }

                match DataPayload::from_json(&body) {
                    Ok(payload) => {
                        self.transmit(&Frame::Ack).await?;
                        self.inbox.push_back(Inbound::Data(payload));
                    }
                    Err(e) => {
                        warn!("{}", FramingFault::MalformedData(e.to_string()));
                        self.transmit(&Frame::Error(ProtocolError::UnexpectedMessage))
                            .await?;
                    }
                }
            }
            Frame::Setpoints(fields) => {
                if !self.handshake.is_completed() {
                    warn!("Setpoints received before handshake");
                    return self.transmit(&Frame::Error(ProtocolError::HandshakeFailed)).await;
                }

                match self.setpoints.accept(fields) {
                    Accumulation::Partial => debug!("Partial setpoint update buffered"),
                    Accumulation::Complete {
                        temperature,
                        humidity,
                    } => {
                        self.transmit(&Frame::SetpointsAck).await?;
                        self.inbox.push_back(Inbound::Setpoints {
                            temperature,
                            humidity,
                        });
                    }
                    Accumulation::Rejected {
                        temperature,
                        humidity,
                    } => {
                        warn!(
                            "Rejected setpoints temp={} humidity={}",
                            temperature, humidity
                        );
                        self.transmit(&Frame::Error(ProtocolError::UnexpectedMessage))
                            .await?;
                    }
                }
            }
            Frame::Ack | Frame::SetpointsAck => {}
            Frame::Error(ProtocolError::HandshakeFailed) => {
                if self.handshake.is_completed() {
                    warn!("Peer lost synchronisation, handshake will be repeated");
                    self.resync_requested = true;
                    self.handshake.reset();
                } else {
                    debug!("Ignoring handshake failure reported before synchronisation");
                }
            }
            Frame::Error(other) => {
                warn!("Peer reported error: {}", other.reason());
                self.inbox.push_back(Inbound::PeerError(other));
            }
        }

        Ok(())
    }

    async fn transmit(&mut self, frame: &Frame) -> Result<(), ChannelError> {
        self.write_all(&frame.encode()).await
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        let mut offset = 0;
        while offset < bytes.len() {
            match self.channel.send(&bytes[offset..]).await {
                Ok(0) => {
                    self.mark_down();
                    return Err(ChannelError::Closed);
                }
                Ok(n) => offset += n,
                Err(e) => {
                    warn!("Channel write failed: {}", e);
                    self.mark_down();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn mark_down(&mut self) {
        if self.status != ChannelStatus::Down {
            info!("{} link down", self.role().name());
        }
        self.status = ChannelStatus::Down;
        self.reset_session();
    }

    fn reset_session(&mut self) {
        self.codec.clear();
        self.handshake.reset();
        self.setpoints.clear();
        self.pending = None;
        self.resync_requested = false;
    }

    fn pending_acked(&self) -> bool {
        self.pending.as_ref().is_some_and(|pending| pending.acked)
    }

    pub fn take_inbound(&mut self) -> Option<Inbound> {
        self.inbox.pop_front()
    }

    pub fn has_inbound(&self) -> bool {
        !self.inbox.is_empty()
    }

    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    pub fn is_up(&self) -> bool {
        self.status == ChannelStatus::Up
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake.state()
    }

    pub fn is_synchronized(&self) -> bool {
        self.is_up() && self.handshake.is_completed()
    }

    pub fn resync_requested(&self) -> bool {
        self.resync_requested
    }

    /// Attempts made so far by the outstanding send, if any.
    pub fn pending_attempts(&self) -> Option<u8> {
        self.pending.as_ref().map(|pending| pending.attempts)
    }

    pub fn role(&self) -> Role {
        self.handshake.role()
    }

    pub fn policy(&self) -> &LinkPolicy {
        &self.policy
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut K {
        &mut self.clock
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::vec;

    use super::*;

    /// In-memory peer that answers lines the link writes according to a script.
    #[derive(Default)]
    struct ScriptedChannel {
        up: bool,
        refuse_connect: bool,
        fail_reads: bool,
        rx: VecDeque<u8>,
        sent: Vec<u8>,
        partial: Vec<u8>,
        rules: Vec<(&'static str, VecDeque<&'static str>)>,
    }

    impl ScriptedChannel {
        fn answering(mut self, prefix: &'static str, replies: &[&'static str]) -> Self {
            self.rules.push((prefix, replies.iter().copied().collect()));
            self
        }

        fn inject(&mut self, bytes: &[u8]) {
            self.rx.extend(bytes.iter().copied());
        }

        fn sent_lines(&self) -> Vec<String> {
            String::from_utf8(self.sent.clone())
                .unwrap()
                .lines()
                .map(String::from)
                .collect()
        }

        fn respond(&mut self, line: &str) {
            for (prefix, replies) in self.rules.iter_mut() {
                if line.starts_with(*prefix) {
                    if let Some(reply) = replies.pop_front() {
                        self.rx.extend(reply.bytes());
                    }
                    return;
                }
            }
        }
    }

    impl ByteChannel for ScriptedChannel {
        async fn connect(&mut self) -> Result<(), ChannelError> {
            if self.refuse_connect {
                return Err(ChannelError::Timeout("CONNECT"));
            }
            self.up = true;
            self.fail_reads = false;
            Ok(())
        }

        fn is_up(&self) -> bool {
            self.up
        }

        async fn send(&mut self, bytes: &[u8]) -> Result<usize, ChannelError> {
            if !self.up {
                return Err(ChannelError::NotConnected);
            }

            self.sent.extend_from_slice(bytes);
            for &byte in bytes {
                if byte == b'\n' {
                    let line = String::from_utf8(core::mem::take(&mut self.partial)).unwrap();
                    self.respond(&line);
                } else {
                    self.partial.push(byte);
                }
            }
            Ok(bytes.len())
        }

        async fn poll_incoming(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
            if self.fail_reads {
                self.up = false;
                return Err(ChannelError::Closed);
            }

            let n = buf.len().min(self.rx.len());
            for slot in buf[..n].iter_mut() {
                *slot = self.rx.pop_front().unwrap();
            }
            Ok(n)
        }

        async fn disconnect(&mut self) -> Result<(), ChannelError> {
            self.up = false;
            Ok(())
        }
    }

    /// Virtual time: sleeping just advances the counter.
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

    const VALID_DATA: &str =
        r#"DATA:{"temperature":23.5,"humidity":41.25,"lux":300,"heater":true,"dehumidifier":false}"#;

    fn station(channel: ScriptedChannel) -> Link<ScriptedChannel, VirtualClock> {
        Link::new(
            channel,
            VirtualClock::default(),
            Role::Station,
            LinkPolicy::default(),
        )
    }

    fn hub(channel: ScriptedChannel) -> Link<ScriptedChannel, VirtualClock> {
        Link::new(channel, VirtualClock::default(), Role::Hub, LinkPolicy::default())
    }

    async fn synchronized_station(
        channel: ScriptedChannel,
    ) -> Link<ScriptedChannel, VirtualClock> {
        let channel = channel.answering("HANDSHAKE:ARDUINO_READY", &["HANDSHAKE:ESP32_READY\n"]);
        let mut link = station(channel);
        link.connect().await.unwrap();
        link.perform_handshake().await.unwrap();
        link.channel_mut().sent.clear();
        link
    }

    #[tokio::test]
    async fn test_station_handshake_completes() {
        let link = synchronized_station(ScriptedChannel::default()).await;
        assert_eq!(link.handshake_state(), HandshakeState::Completed);
        assert!(link.is_synchronized());
    }

    #[tokio::test]
    async fn test_handshake_retries_then_fails() {
        let mut link = station(ScriptedChannel::default());
        link.connect().await.unwrap();

        let result = link.perform_handshake().await;
        assert_eq!(result, Err(HandshakeFailure::Exhausted { attempts: 5 }));
        assert_eq!(link.handshake_state(), HandshakeState::Failed);
        assert_eq!(link.channel().sent_lines().len(), 5);
        assert_eq!(link.clock().now(), RetryPolicy::HANDSHAKE.worst_case());

        assert_eq!(
            link.perform_handshake().await,
            Err(HandshakeFailure::NeedsReconnect)
        );

        link.disconnect().await;
        link.connect().await.unwrap();
        assert_eq!(link.handshake_state(), HandshakeState::NotStarted);
    }

    #[tokio::test]
    async fn test_handshake_completes_on_late_answer() {
        let channel = ScriptedChannel::default()
            .answering("HANDSHAKE:ARDUINO_READY", &["", "", "HANDSHAKE:ESP32_READY\n"]);
        let mut link = station(channel);
        link.connect().await.unwrap();

        link.perform_handshake().await.unwrap();
        assert_eq!(link.channel().sent_lines().len(), 3);
    }

    #[tokio::test]
    async fn test_disconnect_resets_handshake() {
        let mut link = synchronized_station(ScriptedChannel::default()).await;

        link.disconnect().await;
        assert_eq!(link.status(), ChannelStatus::Down);
        assert_eq!(link.handshake_state(), HandshakeState::NotStarted);

        link.connect().await.unwrap();
        assert_eq!(link.status(), ChannelStatus::Up);
        assert_eq!(link.handshake_state(), HandshakeState::NotStarted);
    }

    #[tokio::test]
    async fn test_read_failure_takes_link_down() {
        let mut link = synchronized_station(ScriptedChannel::default()).await;
        link.channel_mut().fail_reads = true;

        assert_eq!(link.pump().await, Err(ChannelError::Closed));
        assert_eq!(link.status(), ChannelStatus::Down);
        assert!(!link.is_synchronized());
        assert_eq!(link.handshake_state(), HandshakeState::NotStarted);
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_link_down() {
        let channel = ScriptedChannel {
            refuse_connect: true,
            ..Default::default()
        };
        let mut link = station(channel);

        assert!(link.connect().await.is_err());
        assert_eq!(link.status(), ChannelStatus::Down);
    }

    #[tokio::test]
    async fn test_each_data_frame_is_acked_in_order() {
        let mut link = hub(ScriptedChannel::default());
        link.connect().await.unwrap();

        link.channel_mut().inject(b"HANDSHAKE:ARDUINO_READY\n");
        link.pump().await.unwrap();
        assert!(link.is_synchronized());

        let second = VALID_DATA.replace("\"lux\":300", "\"lux\":301");
        let input = [VALID_DATA, "\n", second.as_str(), "\n"].concat();
        link.channel_mut().inject(input.as_bytes());
        link.pump().await.unwrap();

        assert_eq!(
            link.channel().sent_lines(),
            vec!["HANDSHAKE:ESP32_READY", "ACK", "ACK"]
        );
        let Some(Inbound::Data(first)) = link.take_inbound() else {
            panic!("expected data");
        };
        let Some(Inbound::Data(next)) = link.take_inbound() else {
            panic!("expected data");
        };
        assert_eq!((first.lux, next.lux), (300, 301));
        assert_eq!(first.temperature, Centi(2350));
        assert!(link.take_inbound().is_none());
    }

    #[tokio::test]
    async fn test_data_before_handshake_is_refused() {
        let mut link = hub(ScriptedChannel::default());
        link.connect().await.unwrap();

        link.channel_mut().inject(VALID_DATA.as_bytes());
        link.channel_mut().inject(b"\n");
        link.pump().await.unwrap();

        assert_eq!(link.channel().sent_lines(), vec!["ERROR:HANDSHAKE_FAILED"]);
        assert!(!link.has_inbound());
    }

    #[tokio::test]
    async fn test_malformed_data_is_answered_with_error() {
        let mut link = synchronized_station(ScriptedChannel::default()).await;

        link.channel_mut().inject(b"garbage\nDATA:{\"temperature\":2500}\n");
        link.pump().await.unwrap();

        assert_eq!(link.channel().sent_lines(), vec!["ERROR:UNEXPECTED_MESSAGE"]);
        assert!(!link.has_inbound());
    }

    #[tokio::test]
    async fn test_setpoints_apply_only_when_complete() {
        let mut link = synchronized_station(ScriptedChannel::default()).await;

        link.channel_mut().inject(b"temp=21.5\n");
        link.pump().await.unwrap();
        assert!(link.channel().sent_lines().is_empty());
        assert!(!link.has_inbound());

        link.channel_mut().inject(b"humidity=40\n");
        link.pump().await.unwrap();
        assert_eq!(link.channel().sent_lines(), vec!["SETPOINTS_ACK"]);
        assert_eq!(
            link.take_inbound(),
            Some(Inbound::Setpoints {
                temperature: Centi(2150),
                humidity: Centi(4000),
            })
        );
    }

    #[tokio::test]
    async fn test_send_with_ack_succeeds() {
        let channel = ScriptedChannel::default().answering("DATA:", &["ACK\n"]);
        let mut link = synchronized_station(channel).await;

        let frame = Frame::Data(VALID_DATA.trim_start_matches("DATA:").into());
        link.send_with_ack(frame, 3).await.unwrap();

        assert_eq!(link.channel().sent_lines().len(), 1);
        assert_eq!(link.pending_attempts(), None);
    }

    #[tokio::test]
    async fn test_delivery_exhaustion_keeps_handshake() {
        let mut link = synchronized_station(ScriptedChannel::default()).await;

        let frame = Frame::Data("{}".into());
        let result = link.send_with_ack(frame, 3).await;

        assert_eq!(result, Err(DeliveryError::Exhausted { attempts: 3 }));
        assert_eq!(link.channel().sent_lines().len(), 3);
        assert_eq!(link.handshake_state(), HandshakeState::Completed);
        assert_eq!(link.pending_attempts(), None);
    }

    #[tokio::test]
    async fn test_wrong_ack_kind_does_not_complete_send() {
        let channel = ScriptedChannel::default().answering("temp=", &["ACK\n", "SETPOINTS_ACK\n"]);
        let mut link = synchronized_station(channel).await;

        link.send_with_ack(Frame::setpoints(Centi(2000), Centi(4000)), 3)
            .await
            .unwrap();
        assert_eq!(link.channel().sent_lines().len(), 2);
    }

    #[tokio::test]
    async fn test_handshake_failed_error_triggers_rehandshake() {
        let channel = ScriptedChannel::default()
            .answering("HANDSHAKE:ARDUINO_READY", &["HANDSHAKE:ESP32_READY\n"; 2])
            .answering("DATA:", &["ERROR:HANDSHAKE_FAILED\n", "ACK\n"]);
        let mut link = synchronized_station(channel).await;

        link.send_with_ack(Frame::Data("{}".into()), 3).await.unwrap();

        assert_eq!(
            link.channel().sent_lines(),
            vec!["DATA:{}", "HANDSHAKE:ARDUINO_READY", "DATA:{}"]
        );
        assert!(link.is_synchronized());
    }

    #[tokio::test]
    async fn test_stale_handshake_error_keeps_ack_timeouts() {
        let channel = ScriptedChannel::default().answering(
            "HANDSHAKE:ARDUINO_READY",
            &["ERROR:HANDSHAKE_FAILED\nHANDSHAKE:ESP32_READY\n"],
        );
        let mut link = station(channel);
        link.connect().await.unwrap();
        link.perform_handshake().await.unwrap();
        assert!(!link.resync_requested());
        link.channel_mut().sent.clear();

        let start = link.clock().now();
        let result = link.send_with_ack(Frame::Data("{}".into()), 3).await;

        assert_eq!(result, Err(DeliveryError::Exhausted { attempts: 3 }));
        assert!(link.clock().now() - start >= RetryPolicy::DELIVERY.worst_case());
        assert_eq!(link.channel().sent_lines(), vec!["DATA:{}"; 3]);
        assert!(!link.resync_requested());
        assert!(link.is_synchronized());
    }

    #[tokio::test]
    async fn test_partial_setpoints_dropped_by_other_frame() {
        let mut link = synchronized_station(ScriptedChannel::default()).await;

        link.channel_mut().inject(b"temp=21.5\nACK\nhumidity=40\n");
        link.pump().await.unwrap();

        assert!(link.channel().sent_lines().is_empty());
        assert!(!link.has_inbound());

        link.channel_mut().inject(b"temp=22\nhumidity=45\n");
        link.pump().await.unwrap();
        assert_eq!(
            link.take_inbound(),
            Some(Inbound::Setpoints {
                temperature: Centi(2200),
                humidity: Centi(4500),
            })
        );
    }

    #[tokio::test]
    async fn test_send_requires_handshake() {
        let mut link = station(ScriptedChannel::default());
        link.connect().await.unwrap();

        assert_eq!(
            link.send_with_ack(Frame::Data("{}".into()), 3).await,
            Err(DeliveryError::NotSynchronized)
        );
        assert_eq!(
            link.send_with_ack(Frame::Ack, 3).await,
            Err(DeliveryError::Unacknowledged)
        );
    }
}
