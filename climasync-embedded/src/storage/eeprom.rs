use alloc::string::String;

use climasync_api::Centi;

use crate::{Error, Result};

use super::{Credentials, NvMemory, SetpointStore};

pub const TEMPERATURE_ADDR: u16 = 0x00;
pub const HUMIDITY_ADDR: u16 = 0x02;
pub const SSID_ADDR: u16 = 0x10;
pub const PASSWORD_ADDR: u16 = 0x30;
/// Size of each credential slot, NUL padded.
pub const CREDENTIAL_SLOT: usize = 32;

const EMPTY_WORD: [u8; 2] = [0xFF, 0xFF];

/// Fixed-address layout over a byte-addressed memory.
pub struct EepromStore<M> {
    memory: M,
}

impl<M: NvMemory> EepromStore<M> {
    pub fn new(memory: M) -> Self {
        Self { memory }
    }

    pub fn inner(&self) -> &M {
        &self.memory
    }

    pub fn into_inner(self) -> M {
        self.memory
    }

    fn read_word(&mut self, address: u16) -> Result<Option<Centi>> {
        let mut word = [0u8; 2];
        self.memory.read(address, &mut word)?;
        if word == EMPTY_WORD {
            return Ok(None);
        }
        Ok(Some(Centi(i16::from_le_bytes(word))))
    }

    fn read_text(&mut self, address: u16) -> Result<Option<String>> {
        let mut slot = [0u8; CREDENTIAL_SLOT];
        self.memory.read(address, &mut slot)?;

        let end = slot.iter().position(|&b| b == 0 || b == 0xFF).unwrap_or(slot.len());
        if end == 0 {
            return Ok(None);
        }
        core::str::from_utf8(&slot[..end])
            .map(|text| Some(String::from(text)))
            .map_err(|_| Error::SerializationError)
    }

    fn write_text(&mut self, address: u16, text: &str) -> Result<()> {
        let bytes = text.as_bytes();
        // one byte is kept for the terminator
        if bytes.len() >= CREDENTIAL_SLOT {
            return Err(Error::CredentialTooLong);
        }

        let mut slot = [0u8; CREDENTIAL_SLOT];
        slot[..bytes.len()].copy_from_slice(bytes);
        self.memory.write(address, &slot)
    }
}

impl<M: NvMemory> SetpointStore for EepromStore<M> {
    type Error = Error;

    async fn load_setpoints(&mut self) -> Result<Option<(Centi, Centi)>> {
        let temperature = self.read_word(TEMPERATURE_ADDR)?;
        let humidity = self.read_word(HUMIDITY_ADDR)?;

        Ok(temperature.zip(humidity))
    }

    async fn save_setpoints(&mut self, temperature: Centi, humidity: Centi) -> Result<()> {
        self.memory
            .write(TEMPERATURE_ADDR, &temperature.raw().to_le_bytes())?;
        self.memory.write(HUMIDITY_ADDR, &humidity.raw().to_le_bytes())
    }

    async fn load_credentials(&mut self) -> Result<Option<Credentials>> {
        let Some(ssid) = self.read_text(SSID_ADDR)? else {
            return Ok(None);
        };
        let password = self.read_text(PASSWORD_ADDR)?.unwrap_or_default();

        Ok(Some(Credentials { ssid, password }))
    }

    async fn save_credentials(&mut self, credentials: &Credentials) -> Result<()> {
        self.write_text(SSID_ADDR, &credentials.ssid)?;
        self.write_text(PASSWORD_ADDR, &credentials.password)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::MemoryEeprom;

    use super::*;

    fn store() -> EepromStore<MemoryEeprom> {
        EepromStore::new(MemoryEeprom::new(128))
    }

    #[tokio::test]
    async fn test_empty_memory_has_nothing_saved() {
        let mut store = store();
        assert_eq!(store.load_setpoints().await, Ok(None));
        assert_eq!(store.load_credentials().await, Ok(None));
    }

    #[tokio::test]
    async fn test_setpoint_layout() {
        let mut store = store();
        store.save_setpoints(Centi(2250), Centi(-5)).await.unwrap();

        let bytes = store.inner().as_bytes();
        assert_eq!(&bytes[0..2], &2250i16.to_le_bytes());
        assert_eq!(&bytes[2..4], &(-5i16).to_le_bytes());

        assert_eq!(store.load_setpoints().await, Ok(Some((Centi(2250), Centi(-5)))));
    }

    #[tokio::test]
    async fn test_credentials_layout() {
        let mut store = store();
        let credentials = Credentials::new("greenhouse", "hunter22");
        store.save_credentials(&credentials).await.unwrap();

        let bytes = store.inner().as_bytes();
        assert_eq!(&bytes[0x10..0x1A], b"greenhouse");
        assert_eq!(bytes[0x1A], 0);
        assert_eq!(&bytes[0x30..0x38], b"hunter22");

        assert_eq!(store.load_credentials().await, Ok(Some(credentials)));
    }

    #[tokio::test]
    async fn test_oversized_credential_rejected() {
        let mut store = store();
        let long = Credentials::new("an-access-point-name-that-is-too-long", "x");
        assert_eq!(
            store.save_credentials(&long).await,
            Err(Error::CredentialTooLong)
        );
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut memory = MemoryEeprom::new(8);
        let mut buf = [0u8; 4];
        assert_eq!(memory.read(6, &mut buf), Err(Error::InvalidAddress(6)));
    }
}
