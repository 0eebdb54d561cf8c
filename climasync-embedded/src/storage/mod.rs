mod eeprom;
mod memory;

pub use eeprom::*;
pub use memory::*;

use alloc::string::String;

use climasync_api::Centi;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

impl Credentials {
    pub fn new(ssid: &str, password: &str) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }
}

/// Durable home of the setpoint pair and WiFi credentials.
#[allow(async_fn_in_trait)]
pub trait SetpointStore {
    type Error;

    /// `None` when nothing was saved yet.
    async fn load_setpoints(&mut self) -> Result<Option<(Centi, Centi)>, Self::Error>;

    async fn save_setpoints(&mut self, temperature: Centi, humidity: Centi)
    -> Result<(), Self::Error>;

    async fn load_credentials(&mut self) -> Result<Option<Credentials>, Self::Error>;

    async fn save_credentials(&mut self, credentials: &Credentials) -> Result<(), Self::Error>;
}

/// Byte-addressed non-volatile memory such as an on-chip EEPROM.
pub trait NvMemory {
    fn capacity(&self) -> usize;

    fn read(&mut self, address: u16, buf: &mut [u8]) -> crate::Result<()>;

    fn write(&mut self, address: u16, data: &[u8]) -> crate::Result<()>;
}
