//! Transport error types.

use lattice_bind::BindError;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures talking to a GraphQL server.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP request could not be sent or its body not read.
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not a GraphQL envelope.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// A message could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configured header is not a valid HTTP header.
    #[error("Invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    /// The websocket failed.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The server broke the graphql-transport-ws protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connecting or acknowledging the connection took too long.
    #[error("Connection timed out")]
    Timeout,

    /// The server closed the connection.
    #[error("Connection closed by server")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<TransportError> for BindError {
    fn from(err: TransportError) -> Self {
        BindError::Client(err.to_string())
    }
}
