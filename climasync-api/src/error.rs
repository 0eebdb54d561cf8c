use core::fmt;

use alloc::string::String;

/// Failures of the underlying byte channel. Every variant means the link is down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Operation attempted while the channel was not up
    NotConnected,
    /// Peer or modem closed the connection
    Closed,
    /// A bring-up or transfer step did not answer in time
    Timeout(&'static str),
    /// A step answered with an error token (`ERROR`, `FAIL`, `SEND FAIL`)
    Rejected(&'static str),
    /// Underlying I/O failure
    Io(String),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "Channel not connected"),
            Self::Closed => write!(f, "Channel closed by peer"),
            Self::Timeout(step) => write!(f, "Timed out waiting for {}", step),
            Self::Rejected(step) => write!(f, "Modem rejected {}", step),
            Self::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

/// Inbound bytes that could not be turned into a frame. Never escalated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingFault {
    /// Assembly buffer filled before a line terminator arrived
    Overflow { capacity: usize },
    /// Line was not valid UTF-8
    InvalidUtf8,
    /// Line did not start with a known tag
    Unrecognized(String),
    /// `DATA:` body was not a valid sensor payload
    MalformedData(String),
}

impl fmt::Display for FramingFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow { capacity } => {
                write!(f, "Frame exceeded {} bytes without terminator", capacity)
            }
            Self::InvalidUtf8 => write!(f, "Frame is not valid UTF-8"),
            Self::Unrecognized(line) => write!(f, "Unrecognized line: {}", line),
            Self::MalformedData(e) => write!(f, "Malformed data payload: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeFailure {
    /// Channel is not up, nothing to handshake over
    ChannelDown,
    /// Retry budget was spent earlier; the channel must be reconnected first
    NeedsReconnect,
    /// Peer never declared readiness within the retry budget
    Exhausted { attempts: u8 },
    /// Channel failed while handshaking
    Channel(ChannelError),
}

impl fmt::Display for HandshakeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelDown => write!(f, "Handshake impossible: channel down"),
            Self::NeedsReconnect => write!(f, "Handshake failed earlier, reconnect required"),
            Self::Exhausted { attempts } => {
                write!(f, "Peer not ready after {} handshake attempts", attempts)
            }
            Self::Channel(e) => write!(f, "Handshake interrupted: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// No acknowledgment after every attempt; the payload was dropped
    Exhausted { attempts: u8 },
    /// The frame kind carries no acknowledgment
    Unacknowledged,
    /// Handshake is not completed on this link
    NotSynchronized,
    /// Re-handshake requested by the peer did not succeed
    Handshake(HandshakeFailure),
    /// Channel failed mid-delivery
    Channel(ChannelError),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts } => {
                write!(f, "No acknowledgment after {} attempts", attempts)
            }
            Self::Unacknowledged => write!(f, "Frame kind is never acknowledged"),
            Self::NotSynchronized => write!(f, "Handshake not completed"),
            Self::Handshake(e) => write!(f, "Re-handshake failed: {}", e),
            Self::Channel(e) => write!(f, "Delivery interrupted: {}", e),
        }
    }
}

impl From<ChannelError> for DeliveryError {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

impl From<HandshakeFailure> for DeliveryError {
    fn from(e: HandshakeFailure) -> Self {
        Self::Handshake(e)
    }
}

impl From<ChannelError> for HandshakeFailure {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ChannelError {}

#[cfg(feature = "std")]
impl std::error::Error for FramingFault {}

#[cfg(feature = "std")]
impl std::error::Error for HandshakeFailure {}

#[cfg(feature = "std")]
impl std::error::Error for DeliveryError {}
