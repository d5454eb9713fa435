//! In-memory client for exercising controllers without a server.
//!
//! [`RecordingClient`] records every `query`, `subscribe` and `unsubscribe`
//! call in order. Queries stay pending until the test settles them with
//! [`resolve_next`](RecordingClient::resolve_next) or
//! [`reject_next`](RecordingClient::reject_next), unless a response was queued
//! up front with [`respond_with`](RecordingClient::respond_with).
//! Subscription payloads are pushed with [`push`](RecordingClient::push).

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::client::{
    DataClient, QueryFuture, Response, SubscriptionCallback, SubscriptionEvent,
    SubscriptionHandle, Subscriptions,
};
use crate::error::{BindError, Result};

/// A call observed by a [`RecordingClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    /// `query(document, variables)`.
    Query {
        document: String,
        variables: Option<Value>,
    },
    /// `subscribe(document, variables)`, answered with `handle`.
    Subscribe {
        document: String,
        variables: Option<Value>,
        handle: u64,
    },
    /// `unsubscribe(handle)`.
    Unsubscribe { handle: u64 },
}

#[derive(Default)]
struct Recorder {
    calls: Vec<ClientCall>,
    queued: VecDeque<Result<Response>>,
    pending: VecDeque<oneshot::Sender<Result<Response>>>,
    live: BTreeMap<u64, SubscriptionCallback>,
    next_handle: u64,
    fail_subscribe: bool,
}

/// A scriptable, recording [`DataClient`].
#[derive(Clone)]
pub struct RecordingClient {
    recorder: Arc<Mutex<Recorder>>,
    subscriptions: bool,
}

impl Default for RecordingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingClient {
    /// A client with subscription support.
    pub fn new() -> Self {
        Self {
            recorder: Arc::new(Mutex::new(Recorder::default())),
            subscriptions: true,
        }
    }

    /// A client without subscription support.
    pub fn without_subscriptions() -> Self {
        Self {
            subscriptions: false,
            ..Self::new()
        }
    }

    /// Queue a result handed to the next query immediately.
    pub fn respond_with(&self, result: Result<Response>) {
        self.recorder.lock().queued.push_back(result);
    }

    /// Make subsequent `subscribe` calls fail.
    pub fn fail_subscriptions(&self, fail: bool) {
        self.recorder.lock().fail_subscribe = fail;
    }

    /// Settle the oldest pending query with a response.
    ///
    /// Returns `false` if no query was pending.
    pub fn resolve_next(&self, response: Response) -> bool {
        self.settle_next(Ok(response))
    }

    /// Settle the oldest pending query with an error.
    pub fn reject_next(&self, error: BindError) -> bool {
        self.settle_next(Err(error))
    }

    /// Settle the newest pending query, leaving older ones pending.
    pub fn resolve_latest(&self, response: Response) -> bool {
        let sender = self.recorder.lock().pending.pop_back();
        sender.is_some_and(|tx| tx.send(Ok(response)).is_ok())
    }

    fn settle_next(&self, result: Result<Response>) -> bool {
        let sender = self.recorder.lock().pending.pop_front();
        sender.is_some_and(|tx| tx.send(result).is_ok())
    }

    /// Number of queries waiting to be settled.
    pub fn pending_queries(&self) -> usize {
        self.recorder.lock().pending.len()
    }

    /// Deliver a payload to a live subscription.
    ///
    /// Returns `false` if the handle is not live.
    pub fn push(&self, handle: u64, data: Value) -> bool {
        self.emit(handle, SubscriptionEvent::Data(data))
    }

    /// Deliver an arbitrary event to a live subscription.
    pub fn emit(&self, handle: u64, event: SubscriptionEvent) -> bool {
        let callback = self.recorder.lock().live.get(&handle).cloned();
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    /// The callback registered for a live handle.
    pub fn callback(&self, handle: u64) -> Option<SubscriptionCallback> {
        self.recorder.lock().live.get(&handle).cloned()
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<ClientCall> {
        self.recorder.lock().calls.clone()
    }

    /// The recorded query calls.
    pub fn queries(&self) -> Vec<(String, Option<Value>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ClientCall::Query {
                    document,
                    variables,
                } => Some((document, variables)),
                _ => None,
            })
            .collect()
    }

    /// Number of `subscribe` calls.
    pub fn subscribe_count(&self) -> usize {
        self.count(|call| matches!(call, ClientCall::Subscribe { .. }))
    }

    /// Number of `unsubscribe` calls.
    pub fn unsubscribe_count(&self) -> usize {
        self.count(|call| matches!(call, ClientCall::Unsubscribe { .. }))
    }

    fn count(&self, predicate: impl Fn(&ClientCall) -> bool) -> usize {
        self.recorder.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Handles that are currently subscribed.
    pub fn live_handles(&self) -> Vec<u64> {
        self.recorder.lock().live.keys().copied().collect()
    }
}

impl DataClient for RecordingClient {
    fn query(&self, document: &str, variables: Option<Value>) -> QueryFuture {
        let mut recorder = self.recorder.lock();
        recorder.calls.push(ClientCall::Query {
            document: document.to_owned(),
            variables,
        });

        if let Some(result) = recorder.queued.pop_front() {
            return futures_util::future::ready(result).boxed();
        }

        let (tx, rx) = oneshot::channel();
        recorder.pending.push_back(tx);
        async move {
            rx.await
                .unwrap_or_else(|_| Err(BindError::client("query dropped by recording client")))
        }
        .boxed()
    }

    fn subscriptions(&self) -> Option<&dyn Subscriptions> {
        if self.subscriptions {
            Some(self as &dyn Subscriptions)
        } else {
            None
        }
    }
}

impl Subscriptions for RecordingClient {
    fn subscribe(
        &self,
        document: &str,
        variables: Option<Value>,
        callback: SubscriptionCallback,
    ) -> Result<SubscriptionHandle> {
        let mut recorder = self.recorder.lock();
        if recorder.fail_subscribe {
            return Err(BindError::subscribe(document, "subscriptions disabled"));
        }

        recorder.next_handle += 1;
        let handle = recorder.next_handle;
        recorder.calls.push(ClientCall::Subscribe {
            document: document.to_owned(),
            variables,
            handle,
        });
        recorder.live.insert(handle, callback);
        Ok(SubscriptionHandle::new(handle))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut recorder = self.recorder.lock();
        recorder.calls.push(ClientCall::Unsubscribe {
            handle: handle.id(),
        });
        recorder.live.remove(&handle.id());
    }
}
