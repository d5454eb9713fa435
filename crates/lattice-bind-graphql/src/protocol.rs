//! Wire messages.
//!
//! Operations are posted over HTTP as [`Operation`] bodies. Subscriptions
//! speak the graphql-transport-ws protocol:
//! <https://github.com/enisdenjo/graphql-ws/blob/master/PROTOCOL.md>

use serde::{Deserialize, Serialize};
use serde_json::Value;

use lattice_bind::{Response, ResponseError};

/// The websocket subprotocol name.
pub const SUBPROTOCOL: &str = "graphql-transport-ws";

/// A GraphQL operation: document plus variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    /// The document.
    pub query: String,
    /// Variables, omitted when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl Operation {
    /// Create an operation.
    pub fn new(query: impl Into<String>, variables: Option<Value>) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

/// Client to server messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConnectionInit {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Subscribe {
        id: String,
        payload: Operation,
    },
    Ping {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Complete {
        id: String,
    },
}

/// Server to client messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck {
        #[serde(default)]
        payload: Option<Value>,
    },
    Next {
        id: String,
        payload: Response,
    },
    Error {
        id: String,
        payload: Vec<ResponseError>,
    },
    Complete {
        id: String,
    },
    Ping {
        #[serde(default)]
        payload: Option<Value>,
    },
    Pong {
        #[serde(default)]
        payload: Option<Value>,
    },
}
