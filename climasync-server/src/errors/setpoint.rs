use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum SetpointError {
    #[error("Temperature setpoint {0} is outside 0-50 °C")]
    InvalidTemperature(f64),

    #[error("Humidity setpoint {0} is outside 0-100 %")]
    InvalidHumidity(f64),
}

impl SetpointError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SetpointError::InvalidTemperature(_) => StatusCode::BAD_REQUEST,
            SetpointError::InvalidHumidity(_) => StatusCode::BAD_REQUEST,
        }
    }
}
