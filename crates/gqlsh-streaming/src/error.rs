//! Streaming error types.

/// Streaming errors.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed: {reason}")]
    ConnectionClosed {
        /// Close reason.
        reason: String,
        /// Close code (for WebSocket).
        code: Option<u16>,
    },

    /// Parse error.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Reconnection limit exceeded.
    #[error("Reconnection limit exceeded after {attempts} attempts")]
    ReconnectLimitExceeded {
        /// Number of reconnection attempts.
        attempts: u32,
    },

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocketError(String),
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;
