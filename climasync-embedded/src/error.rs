use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidAddress(u16),
    CredentialTooLong,
    SerializationError,
    RelayError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidAddress(addr) => write!(f, "Invalid storage address 0x{:02X}", addr),
            Error::CredentialTooLong => write!(f, "Credential does not fit its storage slot"),
            Error::SerializationError => write!(f, "Serialization error"),
            Error::RelayError => write!(f, "Relay output error"),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
