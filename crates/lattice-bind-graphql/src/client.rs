//! GraphQL client implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use lattice_bind::{
    BindError, DataClient, QueryFuture, Response, SubscriptionCallback, SubscriptionHandle,
    Subscriptions,
};

use crate::error::{Result, TransportError};
use crate::protocol::Operation;
use crate::session::{self, SessionConfig};

/// Builder for creating a GraphQL client.
pub struct GraphQLClientBuilder {
    http_url: String,
    websocket_url: Option<String>,
    default_headers: HashMap<String, String>,
    auth_token: Option<String>,
    connection_init_payload: Option<Value>,
    request_timeout: Option<Duration>,
    connection_timeout: Duration,
    keep_alive_interval: Option<Duration>,
    runtime: Option<Handle>,
}

impl GraphQLClientBuilder {
    /// Create a new builder with the specified GraphQL endpoint URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http_url: url.into(),
            websocket_url: None,
            default_headers: HashMap::new(),
            auth_token: None,
            connection_init_payload: None,
            request_timeout: None,
            connection_timeout: Duration::from_secs(30),
            keep_alive_interval: Some(Duration::from_secs(30)),
            runtime: None,
        }
    }

    /// Set a separate WebSocket URL for subscriptions.
    ///
    /// If not set, an `http://` or `https://` endpoint is converted to
    /// `ws://` or `wss://`. Other endpoints get no subscription support.
    pub fn websocket_url(mut self, url: impl Into<String>) -> Self {
        self.websocket_url = Some(url.into());
        self
    }

    /// Add a default header to all requests and websocket handshakes.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Set bearer token authentication.
    ///
    /// Adds the Authorization header and, unless a connection init payload
    /// is set explicitly, passes the token in `connection_init`.
    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.default_headers
            .insert("Authorization".into(), format!("Bearer {token}"));
        self.auth_token = Some(token);
        self
    }

    /// Set the `connection_init` payload for subscription sessions.
    pub fn connection_init_payload(mut self, payload: impl Serialize) -> Self {
        self.connection_init_payload = serde_json::to_value(payload).ok();
        self
    }

    /// Set the request timeout for HTTP operations.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the timeout for connecting and for the server's `connection_ack`.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the keep-alive ping interval for subscription sessions.
    ///
    /// Set to `None` to disable keep-alive pings.
    pub fn keep_alive_interval(mut self, interval: Option<Duration>) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Run subscription sessions on this runtime instead of the current one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the GraphQL client.
    pub fn build(self) -> Result<GraphQLClient> {
        let mut http = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout {
            http = http.timeout(timeout);
        }
        let http = http.build()?;

        let init_payload = self.connection_init_payload.or_else(|| {
            self.auth_token
                .as_ref()
                .map(|token| serde_json::json!({ "Authorization": format!("Bearer {token}") }))
        });

        let websocket = self
            .websocket_url
            .or_else(|| http_to_ws_url(&self.http_url))
            .map(|url| SessionConfig {
                url,
                headers: self.default_headers.clone(),
                init_payload,
                connection_timeout: self.connection_timeout,
                keep_alive_interval: self.keep_alive_interval,
            });

        Ok(GraphQLClient {
            inner: Arc::new(Inner {
                http,
                http_url: self.http_url,
                default_headers: self.default_headers,
                websocket,
                runtime: self.runtime,
                sessions: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        })
    }
}

fn http_to_ws_url(url: &str) -> Option<String> {
    if let Some(rest) = url.strip_prefix("https://") {
        Some(format!("wss://{rest}"))
    } else {
        url.strip_prefix("http://").map(|rest| format!("ws://{rest}"))
    }
}

struct Session {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct Inner {
    http: reqwest::Client,
    http_url: String,
    default_headers: HashMap<String, String>,
    websocket: Option<SessionConfig>,
    runtime: Option<Handle>,
    sessions: Mutex<HashMap<u64, Session>>,
    next_id: AtomicU64,
}

impl Inner {
    async fn execute(&self, operation: &Operation) -> Result<Response> {
        let mut request = self
            .http
            .post(&self.http_url)
            .header("Accept", "application/json")
            .json(operation);
        for (name, value) in &self.default_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// A GraphQL client for queries, mutations and subscriptions.
///
/// Queries and mutations are posted to the HTTP endpoint. Each subscription
/// runs its own graphql-transport-ws session on a spawned task.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use lattice_bind::{DataController, DataSpec};
/// use lattice_bind_graphql::GraphQLClient;
///
/// let client = GraphQLClient::builder("https://api.example.com/graphql")
///     .bearer_auth("my-token")
///     .build()?;
///
/// let controller = DataController::new(spec, Arc::new(client));
/// ```
#[derive(Clone)]
pub struct GraphQLClient {
    inner: Arc<Inner>,
}

impl GraphQLClient {
    /// Create a new builder for configuring a GraphQL client.
    pub fn builder(url: impl Into<String>) -> GraphQLClientBuilder {
        GraphQLClientBuilder::new(url)
    }

    /// Get the HTTP endpoint URL.
    pub fn url(&self) -> &str {
        &self.inner.http_url
    }

    /// Get the WebSocket URL for subscriptions, if any.
    pub fn websocket_url(&self) -> Option<&str> {
        self.inner.websocket.as_ref().map(|ws| ws.url.as_str())
    }

    /// Number of subscription sessions not yet unsubscribed.
    pub fn session_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    /// Post an operation and decode the response envelope.
    pub async fn execute(&self, document: &str, variables: Option<Value>) -> Result<Response> {
        self.inner.execute(&Operation::new(document, variables)).await
    }
}

impl DataClient for GraphQLClient {
    fn query(&self, document: &str, variables: Option<Value>) -> QueryFuture {
        let inner = Arc::clone(&self.inner);
        let operation = Operation::new(document, variables);
        tracing::debug!(target: "lattice_bind_graphql::http", url = %inner.http_url, "posting operation");

        async move {
            let response = inner.execute(&operation).await.map_err(|error| {
                tracing::debug!(target: "lattice_bind_graphql::http", %error, "operation failed");
                BindError::from(error)
            })?;
            if response.has_errors() && response.data.as_ref().is_none_or(Value::is_null) {
                return Err(BindError::Response(response.errors));
            }
            Ok(response)
        }
        .boxed()
    }

    fn subscriptions(&self) -> Option<&dyn Subscriptions> {
        self.inner.websocket.as_ref().map(|_| self as &dyn Subscriptions)
    }
}

impl Subscriptions for GraphQLClient {
    fn subscribe(
        &self,
        document: &str,
        variables: Option<Value>,
        callback: SubscriptionCallback,
    ) -> lattice_bind::Result<SubscriptionHandle> {
        let config = self
            .inner
            .websocket
            .clone()
            .ok_or_else(|| BindError::subscribe(document, "no websocket endpoint configured"))?;
        let runtime = match &self.inner.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| BindError::NoRuntime)?,
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (stop, stopped) = oneshot::channel();
        let task = runtime.spawn(session::run(
            config,
            id.to_string(),
            Operation::new(document, variables),
            callback,
            stopped,
        ));
        self.inner.sessions.lock().insert(id, Session { stop, task });

        tracing::debug!(target: "lattice_bind_graphql::ws", id, "subscription session started");
        Ok(SubscriptionHandle::new(id))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let Some(session) = self.inner.sessions.lock().remove(&handle.id()) else {
            tracing::debug!(target: "lattice_bind_graphql::ws", %handle, "unknown subscription handle");
            return;
        };
        if session.task.is_finished() || session.stop.send(()).is_err() {
            tracing::trace!(target: "lattice_bind_graphql::ws", %handle, "session already ended");
        }
    }
}

impl std::fmt::Debug for GraphQLClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLClient")
            .field("http_url", &self.inner.http_url)
            .field("websocket_url", &self.websocket_url())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_to_ws_url() {
        assert_eq!(
            http_to_ws_url("https://example.com/graphql").as_deref(),
            Some("wss://example.com/graphql")
        );
        assert_eq!(
            http_to_ws_url("http://example.com/graphql").as_deref(),
            Some("ws://example.com/graphql")
        );
        assert_eq!(http_to_ws_url("unix:///tmp/graphql.sock"), None);
    }

    #[test]
    fn test_builder_defaults() {
        let client = GraphQLClient::builder("https://api.example.com/graphql")
            .build()
            .unwrap();

        assert_eq!(client.url(), "https://api.example.com/graphql");
        assert_eq!(client.websocket_url(), Some("wss://api.example.com/graphql"));
        assert!(client.subscriptions().is_some());
    }

    #[test]
    fn test_builder_custom_ws_url() {
        let client = GraphQLClient::builder("https://api.example.com/graphql")
            .websocket_url("wss://ws.example.com/graphql")
            .build()
            .unwrap();

        assert_eq!(client.websocket_url(), Some("wss://ws.example.com/graphql"));
    }

    #[test]
    fn test_no_subscriptions_without_ws_endpoint() {
        let client = GraphQLClient::builder("unix:///tmp/graphql.sock")
            .build()
            .unwrap();

        assert!(client.websocket_url().is_none());
        assert!(client.subscriptions().is_none());
    }

    #[test]
    fn test_bearer_auth_sets_init_payload() {
        let client = GraphQLClient::builder("https://api.example.com/graphql")
            .bearer_auth("my-token")
            .build()
            .unwrap();

        let websocket = client.inner.websocket.as_ref().unwrap();
        assert_eq!(
            websocket.init_payload,
            Some(serde_json::json!({"Authorization": "Bearer my-token"}))
        );
        assert_eq!(
            websocket.headers.get("Authorization").map(String::as_str),
            Some("Bearer my-token")
        );
    }

    #[test]
    fn test_subscribe_without_runtime() {
        let client = GraphQLClient::builder("http://localhost:4000/graphql")
            .build()
            .unwrap();
        let callback: SubscriptionCallback = Arc::new(|_: lattice_bind::SubscriptionEvent| {});

        let error = client
            .subscribe("subscription { tick }", None, callback)
            .unwrap_err();

        assert_eq!(error, BindError::NoRuntime);
        assert_eq!(client.session_count(), 0);
    }
}
