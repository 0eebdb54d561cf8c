use core::fmt::Write as _;

use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::FramingFault;
use crate::models::{Centi, DataPayload, Role};

/// Default capacity of the inbound assembly buffer, in bytes.
pub const DEFAULT_FRAME_CAPACITY: usize = 256;

const FRAME_TERMINATOR: u8 = b'\n';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    HandshakeFailed,
    UnexpectedMessage,
    Other(String),
}

impl ProtocolError {
    pub fn from_reason(reason: &str) -> Self {
        match reason.trim() {
            "HANDSHAKE_FAILED" => Self::HandshakeFailed,
            "UNEXPECTED_MESSAGE" => Self::UnexpectedMessage,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::HandshakeFailed => "HANDSHAKE_FAILED",
            Self::UnexpectedMessage => "UNEXPECTED_MESSAGE",
            Self::Other(reason) => reason,
        }
    }
}

/// Key=value setpoint update; either half may arrive on its own line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetpointFields {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl SetpointFields {
    pub fn both(temperature: Centi, humidity: Centi) -> Self {
        Self {
            temperature: Some(temperature.as_f64()),
            humidity: Some(humidity.as_f64()),
        }
    }

    /// Parses `temp=<float>&humidity=<float>`, tolerating unknown keys.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = Self::default();
        let mut recognized = false;

        for pair in line.split('&') {
            let (key, value) = pair.split_once('=')?;
            let slot = match key.trim() {
                "temp" => &mut fields.temperature,
                "humidity" => &mut fields.humidity,
                _ => continue,
            };

            let number = value.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
            *slot = Some(number);
            recognized = true;
        }

        recognized.then_some(fields)
    }

    fn encode_into(&self, out: &mut String) {
        let mut separator = "";
        if let Some(temperature) = self.temperature {
            let _ = write!(out, "temp={:.2}", temperature);
            separator = "&";
        }
        if let Some(humidity) = self.humidity {
            let _ = write!(out, "{}humidity={:.2}", separator, humidity);
        }
    }
}

/// Which acknowledgment closes an outstanding send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckToken {
    Data,
    Handshake,
    Setpoint,
}

/// One newline-terminated application message.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Handshake(Role),
    /// Raw JSON body; validated by the receiver before it is acknowledged
    Data(String),
    Ack,
    SetpointsAck,
    Error(ProtocolError),
    Setpoints(SetpointFields),
}

impl Frame {
    pub fn data(payload: &DataPayload) -> Result<Self, serde_json::Error> {
        payload.to_json().map(Frame::Data)
    }

    pub fn setpoints(temperature: Centi, humidity: Centi) -> Self {
        Frame::Setpoints(SetpointFields::both(temperature, humidity))
    }

    /// Parses a single line without its terminator.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();

        if let Some(tag) = line.strip_prefix("HANDSHAKE:") {
            return Role::from_ready_tag(tag.trim()).map(Frame::Handshake);
        }
        if let Some(body) = line.strip_prefix("DATA:") {
            return Some(Frame::Data(body.to_string()));
        }
        if let Some(reason) = line.strip_prefix("ERROR:") {
            return Some(Frame::Error(ProtocolError::from_reason(reason)));
        }

        match line {
            "ACK" => Some(Frame::Ack),
            "SETPOINTS_ACK" => Some(Frame::SetpointsAck),
            _ => SetpointFields::parse(line).map(Frame::Setpoints),
        }
    }

    /// Encodes the frame including its terminator.
    pub fn encode(&self) -> Vec<u8> {
        let mut line = String::new();
        match self {
            Frame::Handshake(role) => {
                line.push_str("HANDSHAKE:");
                line.push_str(role.ready_tag());
            }
            Frame::Data(body) => {
                line.push_str("DATA:");
                line.push_str(body);
            }
            Frame::Ack => line.push_str("ACK"),
            Frame::SetpointsAck => line.push_str("SETPOINTS_ACK"),
            Frame::Error(error) => {
                line.push_str("ERROR:");
                line.push_str(error.reason());
            }
            Frame::Setpoints(fields) => fields.encode_into(&mut line),
        }

        let mut bytes = line.into_bytes();
        bytes.push(FRAME_TERMINATOR);
        bytes
    }

    /// Acknowledgment the sender of this frame waits for, if any.
    pub fn expected_ack(&self) -> Option<AckToken> {
        match self {
            Frame::Data(_) => Some(AckToken::Data),
            Frame::Setpoints(_) => Some(AckToken::Setpoint),
            Frame::Handshake(_) => Some(AckToken::Handshake),
            _ => None,
        }
    }

    /// Outstanding send this frame closes, if any.
    pub fn acknowledges(&self) -> Option<AckToken> {
        match self {
            Frame::Ack => Some(AckToken::Data),
            Frame::SetpointsAck => Some(AckToken::Setpoint),
            Frame::Handshake(_) => Some(AckToken::Handshake),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Handshake(_) => "handshake",
            Frame::Data(_) => "data",
            Frame::Ack => "ack",
            Frame::SetpointsAck => "setpoints-ack",
            Frame::Error(_) => "error",
            Frame::Setpoints(_) => "setpoints",
        }
    }
}

/// Line codec over an unframed byte stream.
///
/// Decoded frames are queued inside the codec, so a caller that stops
/// iterating early picks up the remainder on its next `feed`.
#[derive(Debug)]
pub struct FrameCodec {
    buffer: Vec<u8>,
    capacity: usize,
    discarding: bool,
    ready: VecDeque<Result<Frame, FramingFault>>,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_CAPACITY)
    }
}

impl FrameCodec {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            discarding: false,
            ready: VecDeque::new(),
        }
    }

    pub fn encode(frame: &Frame) -> Vec<u8> {
        frame.encode()
    }

    /// Consumes `bytes` and yields every frame (or fault) completed so far.
    pub fn feed(
        &mut self,
        bytes: &[u8],
    ) -> impl Iterator<Item = Result<Frame, FramingFault>> + '_ {
        for &byte in bytes {
            self.push_byte(byte);
        }
        core::iter::from_fn(move || self.ready.pop_front())
    }

    /// Bytes of the current partial line.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.ready.clear();
        self.discarding = false;
    }

    fn push_byte(&mut self, byte: u8) {
        if byte == FRAME_TERMINATOR {
            if self.discarding {
                self.discarding = false;
                self.buffer.clear();
            } else {
                self.finish_line();
            }
            return;
        }

        if self.discarding {
            return;
        }

        if self.buffer.len() >= self.capacity {
            self.buffer.clear();
            self.discarding = true;
            self.ready.push_back(Err(FramingFault::Overflow {
                capacity: self.capacity,
            }));
            return;
        }

        self.buffer.push(byte);
    }

    fn finish_line(&mut self) {
        let decoded = match core::str::from_utf8(&self.buffer) {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(
                Frame::parse_line(line)
                    .ok_or_else(|| FramingFault::Unrecognized(line.trim().to_string())),
            ),
            Err(_) => Some(Err(FramingFault::InvalidUtf8)),
        };

        self.buffer.clear();
        if let Some(result) = decoded {
            self.ready.push_back(result);
        }
    }
}
