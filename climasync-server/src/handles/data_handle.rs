use axum::Json;
use axum::extract::State;

use crate::handles::HubState;
use crate::services::HubSnapshot;

pub async fn get_data(State(state): State<HubState>) -> Json<HubSnapshot> {
    Json(state.service.snapshot().await)
}
