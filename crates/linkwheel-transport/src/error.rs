use thiserror::Error;

/// Errors that can occur within any transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The session with the external client could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An operation needed a session but none is established.
    #[error("Transport not connected")]
    NotConnected,

    /// A message could not be delivered to the remote endpoint.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The external client answered a request with a non-success status.
    #[error("Bridge rejected request with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// An operation did not complete within its deadline.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The transport-specific configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
