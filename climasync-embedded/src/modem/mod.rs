mod at;

pub use at::*;

use core::time::Duration;

use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;

use climasync_api::{ByteChannel, ChannelError};
use embassy_time::{Instant, with_timeout};
use embedded_io_async::{Error as _, Read, Write};
use log::{debug, info, trace, warn};

use crate::clock::to_embassy;

/// Largest payload a single `AT+CIPSEND` accepts.
pub const MAX_SEND_CHUNK: usize = 2048;

const READ_CHUNK: usize = 64;

#[derive(Debug, Clone)]
pub struct ModemConfig {
    pub ssid: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Wait for `ready` after `AT+RST`
    pub reset_timeout: Duration,
    pub command_timeout: Duration,
    pub join_timeout: Duration,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
    /// How long a non-blocking poll listens to the serial line
    pub poll_window: Duration,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            host: String::from("192.168.4.1"),
            port: 8080,
            reset_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(2),
            join_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(5),
            poll_window: Duration::from_millis(10),
        }
    }
}

/// TCP client session driven through an AT-command WiFi modem on a serial port.
pub struct ModemChannel<S> {
    serial: S,
    config: ModemConfig,
    parser: AtParser,
    lines: VecDeque<String>,
    rx: VecDeque<u8>,
    prompt: bool,
    joined: bool,
    up: bool,
}

impl<S> ModemChannel<S>
where
    S: Read + Write,
{
    pub fn new(serial: S, config: ModemConfig) -> Self {
        Self {
            serial,
            config,
            parser: AtParser::new(),
            lines: VecDeque::new(),
            rx: VecDeque::new(),
            prompt: false,
            joined: false,
            up: false,
        }
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    pub fn inner(&self) -> &S {
        &self.serial
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    /// Full bring-up: reset, echo off, station mode, join the access point.
    async fn join_network(&mut self) -> Result<(), ChannelError> {
        let timeout = self.config.command_timeout;

        self.command("AT+RST", "AT+RST", &["ready"], &["ERROR"], self.config.reset_timeout)
            .await?;
        self.command("ATE0", "ATE0", &["OK"], &["ERROR"], timeout).await?;
        self.command("AT+CWMODE=1", "AT+CWMODE", &["OK"], &["ERROR"], timeout)
            .await?;

        let join = format!(
            "AT+CWJAP=\"{}\",\"{}\"",
            self.config.ssid, self.config.password
        );
        self.command(
            &join,
            "AT+CWJAP",
            &["OK"],
            &["FAIL", "ERROR"],
            self.config.join_timeout,
        )
        .await?;

        info!("Joined access point {}", self.config.ssid);
        Ok(())
    }

    async fn open_socket(&mut self) -> Result<(), ChannelError> {
        let start = format!(
            "AT+CIPSTART=\"TCP\",\"{}\",{}",
            self.config.host, self.config.port
        );
        self.command(
            &start,
            "AT+CIPSTART",
            &["CONNECT", "ALREADY CONNECTED"],
            &["ERROR", "FAIL", "CLOSED"],
            self.config.connect_timeout,
        )
        .await?;
        Ok(())
    }

    /// Writes one command line and waits for a success or failure token.
    async fn command(
        &mut self,
        command: &str,
        step: &'static str,
        success: &[&str],
        failure: &[&str],
        timeout: Duration,
    ) -> Result<String, ChannelError> {
        trace!("> {}", command);
        self.lines.clear();
        self.write_raw(command.as_bytes()).await?;
        self.write_raw(b"\r\n").await?;
        self.expect(step, success, failure, timeout).await
    }

    async fn expect(
        &mut self,
        step: &'static str,
        success: &[&str],
        failure: &[&str],
        timeout: Duration,
    ) -> Result<String, ChannelError> {
        let deadline = Instant::now() + to_embassy(timeout);

        loop {
            while let Some(line) = self.lines.pop_front() {
                if success.iter().any(|token| line.starts_with(token)) {
                    return Ok(line);
                }
                if failure.iter().any(|token| line.starts_with(token)) {
                    debug!("{} answered {}", step, line);
                    return Err(ChannelError::Rejected(step));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ChannelError::Timeout(step));
            }
            self.read_once(deadline - now).await?;
        }
    }

    async fn wait_prompt(&mut self, timeout: Duration) -> Result<(), ChannelError> {
        let deadline = Instant::now() + to_embassy(timeout);

        loop {
            if self.prompt {
                self.prompt = false;
                return Ok(());
            }
            while let Some(line) = self.lines.pop_front() {
                if line.starts_with("ERROR") || line.starts_with("link is not valid") {
                    return Err(ChannelError::Rejected("AT+CIPSEND"));
                }
            }
            if !self.up {
                return Err(ChannelError::Closed);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ChannelError::Timeout("AT+CIPSEND prompt"));
            }
            self.read_once(deadline - now).await?;
        }
    }

    /// Reads whatever the serial line delivers within `window` and routes it.
    async fn read_once(&mut self, window: embassy_time::Duration) -> Result<(), ChannelError> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = match with_timeout(window, self.serial.read(&mut chunk)).await {
            Err(_) => return Ok(()),
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(ChannelError::Io(format!("{:?}", e.kind()))),
        };

        for &byte in &chunk[..n] {
            match self.parser.push(byte) {
                Some(AtEvent::Payload(byte)) => self.rx.push_back(byte),
                Some(AtEvent::Prompt) => self.prompt = true,
                Some(AtEvent::Line(line)) => {
                    trace!("< {}", line);
                    if line.ends_with("CLOSED") && self.up {
                        warn!("Modem reports TCP link closed");
                        self.up = false;
                    }
                    self.lines.push_back(line);
                }
                None => {}
            }
        }
        Ok(())
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        self.serial
            .write_all(bytes)
            .await
            .map_err(|e| ChannelError::Io(format!("{:?}", e.kind())))?;
        self.serial
            .flush()
            .await
            .map_err(|e| ChannelError::Io(format!("{:?}", e.kind())))
    }

    async fn transfer(&mut self, payload: &[u8]) -> Result<(), ChannelError> {
        let timeout = self.config.send_timeout;

        self.lines.clear();
        self.prompt = false;
        self.write_raw(format!("AT+CIPSEND={}\r\n", payload.len()).as_bytes())
            .await?;
        self.wait_prompt(timeout).await?;

        self.write_raw(payload).await?;
        self.expect("SEND OK", &["SEND OK"], &["SEND FAIL", "ERROR"], timeout)
            .await?;
        Ok(())
    }
}

impl<S> ByteChannel for ModemChannel<S>
where
    S: Read + Write,
{
    async fn connect(&mut self) -> Result<(), ChannelError> {
        self.up = false;
        self.rx.clear();
        self.lines.clear();
        self.parser.reset();

        if !self.joined {
            self.join_network().await?;
            self.joined = true;
        }

        if let Err(e) = self.open_socket().await {
            // the access point may be gone; redo the full bring-up next time
            self.joined = false;
            return Err(e);
        }

        info!(
            "TCP link to {}:{} established",
            self.config.host, self.config.port
        );
        self.up = true;
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.up
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<usize, ChannelError> {
        if !self.up {
            return Err(ChannelError::NotConnected);
        }

        let len = bytes.len().min(MAX_SEND_CHUNK);
        match self.transfer(&bytes[..len]).await {
            Ok(()) => Ok(len),
            Err(e) => {
                self.up = false;
                Err(e)
            }
        }
    }

    async fn poll_incoming(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        if self.rx.is_empty() && self.up {
            let window = to_embassy(self.config.poll_window);
            if let Err(e) = self.read_once(window).await {
                self.up = false;
                return Err(e);
            }
        }

        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }

        if n == 0 && !self.up {
            return Err(ChannelError::Closed);
        }
        Ok(n)
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        let was_up = self.up;
        self.up = false;
        self.rx.clear();

        if was_up {
            let timeout = self.config.command_timeout;
            self.command("AT+CIPCLOSE", "AT+CIPCLOSE", &["CLOSED", "OK"], &["ERROR"], timeout)
                .await?;
        }
        Ok(())
    }

    async fn probe(&mut self) -> Result<bool, ChannelError> {
        if !self.up {
            return Ok(false);
        }

        let timeout = self.config.command_timeout;
        let status = self
            .command("AT+CIPSTATUS", "AT+CIPSTATUS", &["STATUS:"], &["ERROR"], timeout)
            .await?;
        self.expect("AT+CIPSTATUS", &["OK"], &["ERROR"], timeout).await?;

        let connected = status.trim_start_matches("STATUS:").trim() == "3";
        if !connected {
            self.up = false;
        }
        Ok(connected)
    }
}
