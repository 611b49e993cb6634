use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid data: {0}")]
    Invalid(String),
}

/// Failures surfaced by [`crate::SessionClient`]. The display text is what the
/// session state's `error` field ends up holding.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Locator(String),
    #[error("Invalid WebSocket URL format: {0}")]
    InvalidUrl(String),
    #[error("WebSocket connection failed. Please check your connection and try again.")]
    Transport(String),
    #[error("Failed to auto-reconnect to SSH session")]
    AutoReconnect(#[source] Box<SessionError>),
}
