#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod dedup;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod link;
pub mod models;
pub mod retry;
pub mod setpoint;

pub use dedup::LogDeduplicator;
pub use error::{ChannelError, DeliveryError, FramingFault, HandshakeFailure};
pub use frame::{AckToken, Frame, FrameCodec, ProtocolError, SetpointFields};
pub use handshake::{Handshake, HandshakeEvent, HandshakeState};
pub use link::{ByteChannel, ChannelStatus, Clock, Inbound, Link, LinkPolicy};
pub use models::*;
pub use retry::RetryPolicy;
pub use setpoint::{Accumulation, SetpointAccumulator, SetpointLimits};
