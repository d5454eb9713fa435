//! Subscription lifecycle.
//!
//! Every declared subscription is established on mount. On each property
//! update, subscriptions whose variables changed are replaced: the old handle
//! is unsubscribed first, then a new subscription is created. Teardown
//! unsubscribes everything still held.
//!
//! Each live subscription carries an `active` flag that is cleared when it is
//! disposed, so payloads a client delivers late for a replaced or torn-down
//! subscription never reach local state. The flag is cleared and checked
//! under the state lock, so a delivery already running its transform when
//! the subscription is replaced is dropped too.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::change;
use crate::client::{DataClient, SubscriptionCallback, SubscriptionEvent, SubscriptionHandle};
use crate::declaration::{DataTransform, SubscriptionDeclaration};
use crate::resolver;
use crate::state::{ExternalState, StateCell, Write};
use crate::value::{Fields, PropertySet};

struct LiveSubscription {
    handle: SubscriptionHandle,
    active: Arc<AtomicBool>,
}

/// Subscription name to live handle.
#[derive(Default)]
pub struct SubscriptionTable {
    entries: BTreeMap<String, LiveSubscription>,
}

impl SubscriptionTable {
    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no subscription is live.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a subscription is live under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// The handle held for `id`.
    pub fn handle(&self, id: &str) -> Option<&SubscriptionHandle> {
        self.entries.get(id).map(|live| &live.handle)
    }

    /// Names with a live subscription.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for SubscriptionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(id, live)| (id, &live.handle)))
            .finish()
    }
}

/// Creates, replaces and disposes the subscriptions of one instance.
pub struct SubscriptionLifecycleController {
    declarations: BTreeMap<String, SubscriptionDeclaration>,
    client: Arc<dyn DataClient>,
    cell: Arc<StateCell>,
    table: SubscriptionTable,
}

impl SubscriptionLifecycleController {
    pub(crate) fn new(
        declarations: BTreeMap<String, SubscriptionDeclaration>,
        client: Arc<dyn DataClient>,
        cell: Arc<StateCell>,
    ) -> Self {
        Self {
            declarations,
            client,
            cell,
            table: SubscriptionTable::default(),
        }
    }

    /// The live subscriptions.
    pub fn table(&self) -> &SubscriptionTable {
        &self.table
    }

    /// Establish every declared subscription.
    pub fn on_mount(&mut self, props: &PropertySet) {
        let ids: Vec<String> = self.declarations.keys().cloned().collect();
        for id in ids {
            self.establish(&id, props);
        }
    }

    /// Replace the subscriptions whose variables changed.
    pub fn on_update(&mut self, prev: &PropertySet, next: &PropertySet) {
        let stale: Vec<String> = self
            .declarations
            .iter()
            .filter(|(_, declaration)| change::changed(declaration.variables.as_ref(), prev, next))
            .map(|(id, _)| id.clone())
            .collect();

        for id in stale {
            tracing::debug!(target: "lattice_bind::subscription", id = %id, "variables changed, resubscribing");
            self.establish(&id, next);
        }
    }

    /// Dispose every live subscription.
    pub fn teardown(&mut self) {
        let ids: Vec<String> = self.table.entries.keys().cloned().collect();
        for id in ids {
            self.dispose(&id);
        }
    }

    fn establish(&mut self, id: &str, props: &PropertySet) {
        self.dispose(id);

        let Some(declaration) = self.declarations.get(id) else {
            return;
        };
        let Some(subscriptions) = self.client.subscriptions() else {
            tracing::trace!(
                target: "lattice_bind::subscription",
                id,
                "client has no subscription support, skipping"
            );
            return;
        };

        let variables = resolver::resolve(declaration.variables.as_ref(), props);
        let active = Arc::new(AtomicBool::new(true));
        let callback = delivery_callback(
            id.to_owned(),
            declaration.transform.clone(),
            Arc::downgrade(&self.cell),
            Arc::clone(&active),
        );

        match subscriptions.subscribe(
            &declaration.document,
            variables.as_ref().map(|v| v.to_json()),
            callback,
        ) {
            Ok(handle) => {
                tracing::debug!(target: "lattice_bind::subscription", id, %handle, "subscribed");
                self.table
                    .entries
                    .insert(id.to_owned(), LiveSubscription { handle, active });
            }
            Err(error) => {
                active.store(false, Ordering::Release);
                tracing::warn!(target: "lattice_bind::subscription", id, %error, "failed to subscribe");
            }
        }
    }

    fn dispose(&mut self, id: &str) {
        let Some(live) = self.table.entries.remove(id) else {
            return;
        };
        self.cell
            .exclusive(|| live.active.store(false, Ordering::Release));

        match self.client.subscriptions() {
            Some(subscriptions) => {
                tracing::debug!(target: "lattice_bind::subscription", id, handle = %live.handle, "unsubscribing");
                subscriptions.unsubscribe(live.handle);
            }
            None => {
                tracing::warn!(
                    target: "lattice_bind::subscription",
                    id,
                    handle = %live.handle,
                    "client lost subscription support, dropping handle"
                );
            }
        }
    }
}

fn delivery_callback(
    id: String,
    transform: Option<DataTransform>,
    cell: Weak<StateCell>,
    active: Arc<AtomicBool>,
) -> SubscriptionCallback {
    Arc::new(move |event: SubscriptionEvent| match event {
        SubscriptionEvent::Data(data) => {
            if !active.load(Ordering::Acquire) {
                tracing::trace!(target: "lattice_bind::subscription", id = %id, "dropping payload for disposed subscription");
                return;
            }
            let Some(cell) = cell.upgrade() else {
                return;
            };
            let fields = payload_fields(&id, transform.as_ref(), &cell, data);
            let write = cell.update_if(
                "subscription",
                || active.load(Ordering::Acquire),
                |state| state.merge(fields),
            );
            if write == Write::Rejected {
                tracing::trace!(target: "lattice_bind::subscription", id = %id, "subscription replaced during delivery, dropping payload");
            }
        }
        SubscriptionEvent::Error(message) => {
            tracing::warn!(target: "lattice_bind::subscription", id = %id, %message, "subscription error");
        }
        SubscriptionEvent::Complete => {
            tracing::debug!(target: "lattice_bind::subscription", id = %id, "subscription completed by server");
        }
    })
}

fn payload_fields(
    id: &str,
    transform: Option<&DataTransform>,
    cell: &StateCell,
    data: Value,
) -> Fields {
    match transform {
        Some(transform) => {
            let (props, state) = cell.external();
            transform(&ExternalState::new(&props, &state), &data)
        }
        None => {
            let mut fields = Fields::new();
            fields.insert(id.to_owned(), data);
            fields
        }
    }
}
