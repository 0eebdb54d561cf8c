use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use climasync_api::{ByteChannel, ChannelError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const POLL_WINDOW: Duration = Duration::from_millis(5);

/// Server side of the station link: one accepted TCP client at a time.
pub struct TcpChannel {
    listener: TcpListener,
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
    accept_timeout: Duration,
}

impl TcpChannel {
    pub async fn bind(address: SocketAddr, accept_timeout: Duration) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        tracing::info!("station link listening on {:?}", listener.local_addr()?);

        Ok(Self {
            listener,
            stream: None,
            peer: None,
            accept_timeout,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn drop_stream(&mut self) {
        self.stream = None;
        self.peer = None;
    }
}

fn io_error(e: io::Error) -> ChannelError {
    ChannelError::Io(e.to_string())
}

impl ByteChannel for TcpChannel {
    /// Waits up to the accept timeout for the next client.
    async fn connect(&mut self) -> Result<(), ChannelError> {
        self.drop_stream();

        match timeout(self.accept_timeout, self.listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                stream.set_nodelay(true).map_err(io_error)?;
                tracing::info!("station connected from {}", peer);
                self.stream = Some(stream);
                self.peer = Some(peer);
                Ok(())
            }
            Ok(Err(e)) => Err(io_error(e)),
            Err(_) => Err(ChannelError::Timeout("station connection")),
        }
    }

    fn is_up(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<usize, ChannelError> {
        let stream = self.stream.as_mut().ok_or(ChannelError::NotConnected)?;

        match stream.write(bytes).await {
            Ok(0) if !bytes.is_empty() => {
                self.drop_stream();
                Err(ChannelError::Closed)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.drop_stream();
                Err(io_error(e))
            }
        }
    }

    async fn poll_incoming(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        let stream = self.stream.as_mut().ok_or(ChannelError::NotConnected)?;

        match timeout(POLL_WINDOW, stream.read(buf)).await {
            Err(_) => Ok(0),
            Ok(Ok(0)) => {
                tracing::info!("station closed the connection");
                self.drop_stream();
                Err(ChannelError::Closed)
            }
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => {
                self.drop_stream();
                Err(io_error(e))
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        let result = match self.stream.as_mut() {
            Some(stream) => stream.shutdown().await.map_err(io_error),
            None => Ok(()),
        };
        self.drop_stream();
        result
    }
}
