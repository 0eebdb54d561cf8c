use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::handles::HubState;

/// Dashboard slider form, same keys as the wire frame.
#[derive(Clone, Serialize, Deserialize)]
pub struct SetpointForm {
    pub temp: f64,
    pub humidity: f64,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SetpointBody {
    pub temperature: f64,
    pub humidity: f64,
}

pub async fn update_setpoints_form(
    State(state): State<HubState>,
    Form(form): Form<SetpointForm>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.submit_setpoints(form.temp, form.humidity).await?;

    Ok(Redirect::to("/"))
}

pub async fn update_setpoints(
    State(state): State<HubState>,
    Json(body): Json<SetpointBody>,
) -> Result<impl IntoResponse, ApiError> {
    let command = state
        .service
        .submit_setpoints(body.temperature, body.humidity)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(command)))
}
