use std::sync::Arc;

use axum::Router;
use climasync_api::SetpointLimits;
use climasync_server::app::create_app;
use climasync_server::services::{HubService, SetpointCommand};
use tokio::sync::watch;

pub struct MockApp {
    pub router: Router,
    pub service: Arc<HubService>,
    pub commands: watch::Receiver<Option<SetpointCommand>>,
}

impl MockApp {
    pub fn new() -> Self {
        let (service, commands) = HubService::new(SetpointLimits::default());
        let router = create_app(service.clone());

        Self {
            router,
            service,
            commands,
        }
    }

    pub fn queued(&mut self) -> Option<SetpointCommand> {
        *self.commands.borrow_and_update()
    }
}
