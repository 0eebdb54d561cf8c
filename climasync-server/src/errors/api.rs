use super::SetpointError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Setpoint error: {0}")]
    SetpointError(#[from] SetpointError),

    #[error("Internal error: {0}")]
    InternalError(String),
}
