use alloc::string::String;
use alloc::vec::Vec;

use log::warn;

use super::MAX_SEND_CHUNK;

const IPD_MARKER: &[u8] = b"+IPD,";
const MAX_LINE_LEN: usize = 256;
const MAX_HEADER_LEN: usize = 16;

/// Something the modem said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtEvent {
    /// A complete response line without its `\r\n`
    Line(String),
    /// `>` prompt: the modem is ready for the payload of `AT+CIPSEND`
    Prompt,
    /// One byte of an unsolicited `+IPD` payload
    Payload(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Line,
    IpdHeader,
    IpdPayload { remaining: usize },
}

/// Byte-at-a-time tokenizer for modem output.
///
/// Response lines, the send prompt and `+IPD,<len>:` / `+IPD,<id>,<len>:`
/// payloads can all be interleaved on the same serial line.
#[derive(Debug)]
pub struct AtParser {
    state: ParseState,
    buffer: Vec<u8>,
}

impl Default for AtParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AtParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Line,
            buffer: Vec::with_capacity(64),
        }
    }

    pub fn reset(&mut self) {
        self.state = ParseState::Line;
        self.buffer.clear();
    }

    pub fn push(&mut self, byte: u8) -> Option<AtEvent> {
        match self.state {
            ParseState::IpdPayload { remaining } => {
                self.state = if remaining > 1 {
                    ParseState::IpdPayload {
                        remaining: remaining - 1,
                    }
                } else {
                    ParseState::Line
                };
                Some(AtEvent::Payload(byte))
            }
            ParseState::IpdHeader => self.push_header(byte),
            ParseState::Line => self.push_line(byte),
        }
    }

    fn push_line(&mut self, byte: u8) -> Option<AtEvent> {
        match byte {
            b'\n' => {
                let line: String = String::from_utf8_lossy(&self.buffer).trim().into();
                self.buffer.clear();
                (!line.is_empty()).then_some(AtEvent::Line(line))
            }
            b'\r' => None,
            b'>' if self.buffer.is_empty() => Some(AtEvent::Prompt),
            _ => {
                if self.buffer.len() >= MAX_LINE_LEN {
                    self.buffer.clear();
                }
                self.buffer.push(byte);
                if self.buffer.as_slice() == IPD_MARKER {
                    self.buffer.clear();
                    self.state = ParseState::IpdHeader;
                }
                None
            }
        }
    }

    fn push_header(&mut self, byte: u8) -> Option<AtEvent> {
        if byte != b':' {
            let digit_or_comma = byte.is_ascii_digit() || byte == b',';
            if digit_or_comma && self.buffer.len() < MAX_HEADER_LEN {
                self.buffer.push(byte);
            } else {
                // not a well-formed header, fall back to line mode
                self.reset();
            }
            return None;
        }

        // `<len>` is the last field: `+IPD,<len>:` or `+IPD,<id>,<len>:`
        let length = core::str::from_utf8(&self.buffer)
            .ok()
            .and_then(|header| header.rsplit(',').next())
            .and_then(|len| len.parse::<usize>().ok());

        self.buffer.clear();
        self.state = match length {
            Some(remaining) if remaining > 0 && remaining <= MAX_SEND_CHUNK => {
                ParseState::IpdPayload { remaining }
            }
            Some(remaining) if remaining > MAX_SEND_CHUNK => {
                warn!("Dropping +IPD header with length {}", remaining);
                ParseState::Line
            }
            _ => ParseState::Line,
        };
        None
    }
}
