#![no_std]

extern crate alloc;

pub mod clock;
pub mod control;
pub mod error;
pub mod modem;
pub mod sensor;
pub mod station;
pub mod storage;

pub use clock::*;
pub use control::*;
pub use error::*;
pub use modem::*;
pub use sensor::*;
pub use station::*;
pub use storage::*;
