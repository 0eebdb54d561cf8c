use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use climasync_api::{ByteChannel, ChannelError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const POLL_WINDOW: Duration = Duration::from_millis(5);

/// Station side of the hub link over plain TCP, standing in for the AT modem.
pub struct TcpClientChannel {
    address: SocketAddr,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpClientChannel {
    pub fn new(address: SocketAddr, connect_timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout,
            stream: None,
        }
    }
}

fn io_error(e: io::Error) -> ChannelError {
    ChannelError::Io(e.to_string())
}

impl ByteChannel for TcpClientChannel {
    async fn connect(&mut self) -> Result<(), ChannelError> {
        self.stream = None;

        let stream = timeout(self.connect_timeout, TcpStream::connect(self.address))
            .await
            .map_err(|_| ChannelError::Timeout("hub connection"))?
            .map_err(io_error)?;
        stream.set_nodelay(true).map_err(io_error)?;

        self.stream = Some(stream);
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<usize, ChannelError> {
        let stream = self.stream.as_mut().ok_or(ChannelError::NotConnected)?;

        match stream.write(bytes).await {
            Ok(n) => Ok(n),
            Err(e) => {
                self.stream = None;
                Err(io_error(e))
            }
        }
    }

    async fn poll_incoming(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        let stream = self.stream.as_mut().ok_or(ChannelError::NotConnected)?;

        match timeout(POLL_WINDOW, stream.read(buf)).await {
            Err(_) => Ok(0),
            Ok(Ok(0)) => {
                self.stream = None;
                Err(ChannelError::Closed)
            }
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => {
                self.stream = None;
                Err(io_error(e))
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        match self.stream.take() {
            Some(mut stream) => stream.shutdown().await.map_err(io_error),
            None => Ok(()),
        }
    }
}
