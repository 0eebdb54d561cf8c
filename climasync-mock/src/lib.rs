use std::cell::Cell;
use std::net::{IpAddr, SocketAddr};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use climasync_embedded::{
    EepromStore, EmbassyClock, MemoryEeprom, RelayBank, Station, load_credentials,
};

use crate::channel::TcpClientChannel;
use crate::relay::SimulatedRelay;
use crate::settings::Settings;
use crate::simulate::SimulatedRoom;

mod channel;
mod relay;
pub mod settings;
mod simulate;

const EEPROM_SIZE: usize = 128;

pub async fn run(settings: &Arc<Settings>) -> ! {
    let config = settings.station.config();

    let ip_addr = settings.hub.host.parse::<IpAddr>().unwrap_or_else(|e| {
        tracing::warn!("invalid hub host {:?} ({}), using loopback", settings.hub.host, e);
        IpAddr::from([127, 0, 0, 1])
    });
    let address = SocketAddr::from((ip_addr, settings.hub.port));

    let heater = Rc::new(Cell::new(false));
    let dehumidifier = Rc::new(Cell::new(false));
    let sensors = SimulatedRoom::new(
        settings.station.day_length(),
        heater.clone(),
        dehumidifier.clone(),
    );
    let relays = RelayBank::new(
        SimulatedRelay::new("heater", heater),
        SimulatedRelay::new("dehumidifier", dehumidifier),
        false,
    );

    let mut store = EepromStore::new(MemoryEeprom::new(EEPROM_SIZE));
    let credentials = load_credentials(&mut store, &config.default_credentials).await;
    tracing::info!("mock station for network {:?} reporting to {}", credentials.ssid, address);

    let channel = TcpClientChannel::new(
        address,
        Duration::from_millis(settings.hub.connect_timeout_ms),
    );
    let mut station = Station::new(channel, EmbassyClock::new(), sensors, store, relays, config);

    station.run().await
}
