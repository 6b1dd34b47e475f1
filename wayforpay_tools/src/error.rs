use thiserror::Error;

#[derive(Debug, Error)]
pub enum WayForPayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid callback signature")]
    InvalidSignature,
    #[error("Gateway request failed: {0}")]
    RequestError(String),
    #[error("Gateway returned non-JSON (HTTP {status}): {body}")]
    NonJsonResponse { status: u16, body: String },
    #[error("Gateway returned HTTP {status}: {message}")]
    QueryError { status: u16, message: String },
}
