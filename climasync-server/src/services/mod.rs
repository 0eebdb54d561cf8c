pub mod clock;
pub mod hub_service;
pub mod transport;

pub use clock::TokioClock;
pub use hub_service::{HubCycle, HubLink, HubService, HubSnapshot, LinkStatus, SetpointCommand};
pub use transport::TcpChannel;
