use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order not found: {0}")]
    OrderNotFound(String),
    #[error("No event is currently open for ticket sales")]
    NoActiveEvent,
}

impl OrderFlowError {
    pub fn db<E: std::error::Error>(e: E) -> Self {
        Self::DatabaseError(e.to_string())
    }
}
