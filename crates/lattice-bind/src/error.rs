//! Error types for data bindings.

use crate::client::ResponseError;

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, BindError>;

/// Errors produced while executing or reconciling data bindings.
///
/// Errors are cloneable because the primary query's failure is stored in
/// [`LocalState::error`](crate::LocalState::error) and handed to every render.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    /// The data-access client rejected or failed the request.
    #[error("Client error: {0}")]
    Client(String),

    /// The request completed but the server reported only errors.
    #[error("Request failed: {}", join_messages(.0))]
    Response(Vec<ResponseError>),

    /// No tokio runtime was available to run the request.
    #[error("No async runtime available; mount the controller from within a tokio runtime")]
    NoRuntime,

    /// The owning controller has already been torn down.
    #[error("Data controller has been torn down")]
    Disposed,

    /// Establishing a subscription failed.
    #[error("Failed to subscribe '{id}': {message}")]
    Subscribe { id: String, message: String },

    /// No bound query or mutation exists under the requested name.
    #[error("No bound request named '{0}'")]
    UnknownRequest(String),

    /// Configuration could not be loaded.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl BindError {
    /// Create a client error.
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }

    /// Create a subscription error.
    pub fn subscribe(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscribe {
            id: id.into(),
            message: message.into(),
        }
    }
}

fn join_messages(errors: &[ResponseError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<toml::de::Error> for BindError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_error_display_joins_messages() {
        let err = BindError::Response(vec![
            ResponseError::new("first"),
            ResponseError::new("second"),
        ]);
        assert_eq!(err.to_string(), "Request failed: first; second");
    }

    #[test]
    fn test_subscribe_error_display() {
        let err = BindError::subscribe("messages", "socket closed");
        assert_eq!(
            err.to_string(),
            "Failed to subscribe 'messages': socket closed"
        );
    }
}
