use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyCrmApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("KeyCRM is not configured. Set the TPS_KEYCRM_API_KEY environment variable.")]
    NotConfigured,
    #[error("CRM request failed: {0}")]
    RequestError(String),
    #[error("CRM returned non-JSON (HTTP {status}): {body}")]
    NonJsonResponse { status: u16, body: String },
    #[error("CRM returned HTTP {status}: {message}")]
    QueryError { status: u16, message: String },
    #[error("CRM response was missing an expected field: {0}")]
    MissingField(String),
}
