//! The data-access client contract.
//!
//! The controller never talks to a server itself. It drives an implementation
//! of [`DataClient`], which executes queries and mutations, and optionally of
//! [`Subscriptions`], which manages live subscription transport.
//!
//! `lattice-bind-graphql` provides a client over GraphQL HTTP and
//! `graphql-transport-ws`; [`crate::testing::RecordingClient`] (behind the
//! `test-util` feature) provides an in-memory one.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// The future returned by [`DataClient::query`].
pub type QueryFuture = BoxFuture<'static, Result<Response>>;

/// A client capable of executing query and mutation documents.
///
/// `query` is called synchronously when a request is issued; the returned
/// future is awaited afterwards. Implementations should start the request
/// (or at least capture everything they need) before returning.
pub trait DataClient: Send + Sync {
    /// Execute a query or mutation document with optional variables.
    fn query(&self, document: &str, variables: Option<Value>) -> QueryFuture;

    /// Live subscription support, if the client has any.
    ///
    /// When this returns `None`, subscription declarations are no-ops.
    fn subscriptions(&self) -> Option<&dyn Subscriptions> {
        None
    }
}

/// Optional live-subscription capability of a [`DataClient`].
pub trait Subscriptions: Send + Sync {
    /// Start a subscription. Returns immediately; data is delivered later
    /// through `callback`, possibly many times.
    fn subscribe(
        &self,
        document: &str,
        variables: Option<Value>,
        callback: SubscriptionCallback,
    ) -> Result<SubscriptionHandle>;

    /// Stop a subscription. After this returns the callback must not be
    /// invoked again for this handle.
    fn unsubscribe(&self, handle: SubscriptionHandle);
}

/// An event delivered to a subscription callback.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// A new data payload.
    Data(Value),
    /// The subscription failed; no further events follow.
    Error(String),
    /// The server completed the subscription.
    Complete,
}

/// Callback invoked by the client for each subscription event.
pub type SubscriptionCallback = Arc<dyn Fn(SubscriptionEvent) + Send + Sync>;

/// Opaque token identifying a live subscription.
///
/// Handles are deliberately neither `Clone` nor `Copy`: the holder owns the
/// subscription and gives the handle up when unsubscribing, so a handle can
/// be disposed at most once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Create a handle from a client-specific identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The client-specific identifier.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription#{}", self.0)
    }
}

/// The response envelope returned by a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The data returned by the operation.
    #[serde(default)]
    pub data: Option<Value>,

    /// Errors reported alongside (or instead of) the data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ResponseError>,

    /// Additional response metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl Response {
    /// Create a successful response carrying `data`.
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }

    /// Create a response carrying only errors.
    pub fn errors(errors: Vec<ResponseError>) -> Self {
        Self {
            errors,
            ..Default::default()
        }
    }

    /// Check if the response contains errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// An error entry of a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    /// The error message.
    pub message: String,

    /// Locations in the document where the error occurred.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// Path to the field that caused the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,

    /// Additional error metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl ResponseError {
    /// Create an error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: None,
        }
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(path) = &self.path {
            f.write_str(" (at ")?;
            for (i, segment) in path.iter().enumerate() {
                match segment {
                    PathSegment::Field(name) if i == 0 => write!(f, "{name}")?,
                    PathSegment::Field(name) => write!(f, ".{name}")?,
                    PathSegment::Index(idx) => write!(f, "[{idx}]")?,
                }
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// A location in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub column: u32,
}

/// A segment in an error path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A field name.
    Field(String),
    /// An array index.
    Index(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_envelope() {
        let response: Response = serde_json::from_value(json!({
            "data": {"user": null},
            "errors": [{
                "message": "Permission denied",
                "locations": [{"line": 2, "column": 3}],
                "path": ["user", 0, "email"]
            }]
        }))
        .unwrap();

        assert!(response.has_errors());
        let error = &response.errors[0];
        assert_eq!(error.locations[0].line, 2);
        assert_eq!(error.to_string(), "Permission denied (at user[0].email)");
    }

    #[test]
    fn test_decode_missing_fields() {
        let response: Response = serde_json::from_value(json!({})).unwrap();
        assert!(response.data.is_none());
        assert!(!response.has_errors());
    }
}
