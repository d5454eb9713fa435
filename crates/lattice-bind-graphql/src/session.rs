//! One graphql-transport-ws session per subscription.
//!
//! A session connects, sends `connection_init`, waits for `connection_ack`,
//! sends `subscribe` and then relays `next` payloads to the subscription
//! callback until the server completes it, the connection fails, or the
//! owner asks it to stop. Stopping sends `complete` before closing.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue, header};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use lattice_bind::{BindError, SubscriptionCallback, SubscriptionEvent};

use crate::error::{Result, TransportError};
use crate::protocol::{ClientMessage, Operation, SUBPROTOCOL, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings shared by every session of a client.
#[derive(Debug, Clone)]
pub(crate) struct SessionConfig {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub init_payload: Option<Value>,
    pub connection_timeout: Duration,
    pub keep_alive_interval: Option<Duration>,
}

/// Run a session until it ends or `stop` fires (or its sender is dropped).
pub(crate) async fn run(
    config: SessionConfig,
    id: String,
    operation: Operation,
    callback: SubscriptionCallback,
    mut stop: oneshot::Receiver<()>,
) {
    let connected = tokio::select! {
        connected = open(&config, &id, operation) => connected,
        _ = &mut stop => {
            tracing::debug!(target: "lattice_bind_graphql::ws", id = %id, "stopped while connecting");
            return;
        }
    };

    let mut ws = match connected {
        Ok(ws) => ws,
        Err(error) => {
            tracing::warn!(target: "lattice_bind_graphql::ws", id = %id, %error, "failed to start subscription");
            callback(SubscriptionEvent::Error(error.to_string()));
            return;
        }
    };

    if let Err(error) = relay(&mut ws, &config, &id, &callback, &mut stop).await {
        tracing::warn!(target: "lattice_bind_graphql::ws", id = %id, %error, "subscription session failed");
        callback(SubscriptionEvent::Error(error.to_string()));
    }

    if let Err(error) = ws.close(None).await {
        tracing::trace!(target: "lattice_bind_graphql::ws", id = %id, %error, "close failed");
    }
}

async fn open(config: &SessionConfig, id: &str, operation: Operation) -> Result<WsStream> {
    let mut request = config.url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(
        header::SEC_WEBSOCKET_PROTOCOL,
        HeaderValue::from_static(SUBPROTOCOL),
    );
    for (name, value) in &config.headers {
        let invalid = |message: String| TransportError::InvalidHeader {
            name: name.clone(),
            message,
        };
        let header_name =
            HeaderName::try_from(name.as_str()).map_err(|e| invalid(e.to_string()))?;
        let header_value =
            HeaderValue::try_from(value.as_str()).map_err(|e| invalid(e.to_string()))?;
        headers.insert(header_name, header_value);
    }

    tracing::debug!(target: "lattice_bind_graphql::ws", id, url = %config.url, "connecting");
    let (mut ws, _) = tokio::time::timeout(
        config.connection_timeout,
        tokio_tungstenite::connect_async(request),
    )
    .await
    .map_err(|_| TransportError::Timeout)??;

    send(
        &mut ws,
        &ClientMessage::ConnectionInit {
            payload: config.init_payload.clone(),
        },
    )
    .await?;
    tokio::time::timeout(config.connection_timeout, await_ack(&mut ws))
        .await
        .map_err(|_| TransportError::Timeout)??;
    tracing::debug!(target: "lattice_bind_graphql::ws", id, "connection acknowledged");

    send(
        &mut ws,
        &ClientMessage::Subscribe {
            id: id.to_owned(),
            payload: operation,
        },
    )
    .await?;
    Ok(ws)
}

async fn await_ack(ws: &mut WsStream) -> Result<()> {
    loop {
        match receive(ws).await? {
            Some(ServerMessage::ConnectionAck { .. }) => return Ok(()),
            Some(ServerMessage::Ping { payload }) => {
                send(ws, &ClientMessage::Pong { payload }).await?;
            }
            Some(other) => {
                return Err(TransportError::Protocol(format!(
                    "expected connection_ack, got {other:?}"
                )));
            }
            None => {}
        }
    }
}

async fn relay(
    ws: &mut WsStream,
    config: &SessionConfig,
    id: &str,
    callback: &SubscriptionCallback,
    stop: &mut oneshot::Receiver<()>,
) -> Result<()> {
    let mut keep_alive = config
        .keep_alive_interval
        .map(|period| tokio::time::interval_at(Instant::now() + period, period));

    loop {
        tokio::select! {
            _ = &mut *stop => {
                tracing::debug!(target: "lattice_bind_graphql::ws", id, "completing subscription");
                return send(ws, &ClientMessage::Complete { id: id.to_owned() }).await;
            }
            _ = tick(&mut keep_alive) => {
                send(ws, &ClientMessage::Ping { payload: None }).await?;
            }
            message = receive(ws) => match message? {
                Some(ServerMessage::Next { id: op, payload }) if op == id => {
                    if payload.has_errors() {
                        let error = BindError::Response(payload.errors);
                        callback(SubscriptionEvent::Error(error.to_string()));
                    }
                    if let Some(data) = payload.data.filter(|data| !data.is_null()) {
                        callback(SubscriptionEvent::Data(data));
                    }
                }
                Some(ServerMessage::Error { id: op, payload }) if op == id => {
                    callback(SubscriptionEvent::Error(BindError::Response(payload).to_string()));
                    return Ok(());
                }
                Some(ServerMessage::Complete { id: op }) if op == id => {
                    tracing::debug!(target: "lattice_bind_graphql::ws", id, "server completed subscription");
                    callback(SubscriptionEvent::Complete);
                    return Ok(());
                }
                Some(ServerMessage::Ping { payload }) => {
                    send(ws, &ClientMessage::Pong { payload }).await?;
                }
                Some(other) => {
                    tracing::trace!(target: "lattice_bind_graphql::ws", id, message = ?other, "ignoring message");
                }
                None => {}
            }
        }
    }
}

/// Read the next protocol message. `Ok(None)` means a frame that carries no
/// protocol message was consumed.
async fn receive(ws: &mut WsStream) -> Result<Option<ServerMessage>> {
    match ws.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerMessage>(&text) {
            Ok(message) => Ok(Some(message)),
            Err(error) => {
                tracing::debug!(target: "lattice_bind_graphql::ws", %error, "unrecognized message");
                Ok(None)
            }
        },
        Some(Ok(Message::Close(_))) | None => Err(TransportError::Closed),
        Some(Ok(_)) => Ok(None),
        Some(Err(error)) => Err(error.into()),
    }
}

async fn send(ws: &mut WsStream, message: &ClientMessage) -> Result<()> {
    let json = serde_json::to_string(message)?;
    ws.send(Message::Text(json.into())).await?;
    Ok(())
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
