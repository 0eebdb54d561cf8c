use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handles::*;
use crate::services::HubService;

pub fn create_app(service: Arc<HubService>) -> Router {
    Router::new()
        .route("/", get(get_dashboard))
        .route("/data", get(get_data))
        .route("/update", post(update_setpoints_form))
        .route("/setpoints", post(update_setpoints))
        .with_state(HubState { service })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
