use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use climasync_api::SetpointLimits;
use tokio::net::TcpListener;

use crate::app::create_app;
use crate::configs::settings::Settings;
use crate::services::{HubLink, HubService, TcpChannel, TokioClock};

pub mod app;
pub mod configs;
pub mod errors;
pub mod handles;
pub mod services;

fn socket_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let ip_addr = host
        .parse::<IpAddr>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    Ok(SocketAddr::from((ip_addr, port)))
}

pub async fn run(settings: &Arc<Settings>) -> io::Result<()> {
    let (service, commands) = HubService::new(SetpointLimits::default());

    let link_address = socket_address(&settings.link.host, settings.link.port)?;
    let channel = TcpChannel::bind(link_address, settings.link.accept_timeout()).await?;
    let hub_link = HubLink::new(
        channel,
        TokioClock::new(),
        settings.link.policy(),
        service.clone(),
        commands,
    );
    tokio::spawn(hub_link.run());

    let app = create_app(service);

    let address = socket_address(&settings.server.host, settings.server.port)?;

    let listener = TcpListener::bind(&address).await?;

    tracing::info!("listening on {:?}", address);

    axum::serve(listener, app).await
}
