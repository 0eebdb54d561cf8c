mod dashboard_handle;
mod data_handle;
mod setpoint_handle;

pub use dashboard_handle::*;
pub use data_handle::*;
pub use setpoint_handle::*;

use std::sync::Arc;

use crate::services::HubService;

#[derive(Clone)]
pub struct HubState {
    pub service: Arc<HubService>,
}
