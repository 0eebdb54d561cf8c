use alloc::vec::Vec;

/// Number of leading bytes compared between consecutive messages.
pub const DEDUP_PREFIX_LEN: usize = 100;

/// Suppresses a log line identical to the one immediately before it.
#[derive(Debug, Default)]
pub struct LogDeduplicator {
    last: Vec<u8>,
}

impl LogDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `message` should be emitted.
    pub fn admit(&mut self, message: &str) -> bool {
        let bytes = message.as_bytes();
        let prefix = &bytes[..bytes.len().min(DEDUP_PREFIX_LEN)];

        if prefix == self.last.as_slice() {
            return false;
        }

        self.last.clear();
        self.last.extend_from_slice(prefix);
        true
    }

    pub fn reset(&mut self) {
        self.last.clear();
    }
}
