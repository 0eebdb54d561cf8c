use core::time::Duration;

use crate::error::ChannelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Down,
    Connecting,
    Up,
}

impl ChannelStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Down => "down",
            Self::Connecting => "connecting",
            Self::Up => "up",
        }
    }
}

/// Bidirectional byte stream with a coarse up/down status.
///
/// Implementations never retry internally: a failed step is reported and the
/// caller decides whether to reconnect.
#[allow(async_fn_in_trait)]
pub trait ByteChannel {
    /// Brings the stream up. On error the channel is down.
    async fn connect(&mut self) -> Result<(), ChannelError>;

    fn is_up(&self) -> bool;

    /// Writes as many bytes as the transport accepts in one go.
    async fn send(&mut self, bytes: &[u8]) -> Result<usize, ChannelError>;

    /// Copies already-received bytes into `buf` without waiting for more.
    /// `Ok(0)` means nothing is pending.
    async fn poll_incoming(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError>;

    async fn disconnect(&mut self) -> Result<(), ChannelError>;

    /// Actively checks that the stream is still alive.
    async fn probe(&mut self) -> Result<bool, ChannelError> {
        Ok(self.is_up())
    }
}

/// Monotonic time source with cooperative sleep.
#[allow(async_fn_in_trait)]
pub trait Clock {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    async fn sleep(&mut self, duration: Duration);
}
