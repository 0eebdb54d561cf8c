use alloc::vec;
use alloc::vec::Vec;

use crate::{Error, Result};

use super::NvMemory;

/// RAM-backed stand-in for an EEPROM; starts fully erased.
pub struct MemoryEeprom {
    data: Vec<u8>,
}

impl MemoryEeprom {
    pub const ERASED: u8 = 0xFF;

    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![Self::ERASED; capacity],
        }
    }

    pub fn erase(&mut self) {
        self.data.fill(Self::ERASED);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, address: u16, len: usize) -> Result<core::ops::Range<usize>> {
        let start = address as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(Error::InvalidAddress(address));
        }
        Ok(start..end)
    }
}

impl NvMemory for MemoryEeprom {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<()> {
        let range = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<()> {
        let range = self.range(address, data.len())?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }
}
