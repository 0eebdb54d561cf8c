pub mod settings;

pub use settings::{Link, Logger, Retry, Server, Settings};
