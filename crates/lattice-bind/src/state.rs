//! Local state of a bound component instance.
//!
//! [`LocalState`] is the bag handed to every render: the primary query's
//! `loading`/`loaded`/`error` flags plus whatever fields responses,
//! transforms and subscriptions merged in.
//!
//! The state is owned by one controller instance. Request tasks and
//! subscription callbacks reach it through a shared [`StateCell`], which
//! refuses every write once the instance has been torn down.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::BindError;
use crate::signal::Signal;
use crate::value::{Fields, PropertySet};

/// Status of the primary query, derived from the state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    /// No request has been issued.
    #[default]
    Idle,
    /// A request is in flight.
    Loading,
    /// The last request succeeded.
    Loaded,
    /// The last request failed.
    Error,
}

/// State exposed to the rendered output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalState {
    /// Whether the primary query is in flight.
    pub loading: bool,
    /// Whether the primary query has completed successfully.
    pub loaded: bool,
    /// The primary query's last failure.
    pub error: Option<BindError>,
    fields: Fields,
}

impl LocalState {
    /// Get a merged field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All merged fields.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Merge fields in, overwriting existing keys. Keys are never removed.
    pub fn merge(&mut self, fields: Fields) {
        self.fields.extend(fields);
    }

    /// The primary query status.
    pub fn status(&self) -> QueryStatus {
        if self.loading {
            QueryStatus::Loading
        } else if self.loaded {
            QueryStatus::Loaded
        } else if self.error.is_some() {
            QueryStatus::Error
        } else {
            QueryStatus::Idle
        }
    }

    /// Render the state as a single JSON object.
    pub fn to_json(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("loading".into(), Value::Bool(self.loading));
        map.insert("loaded".into(), Value::Bool(self.loaded));
        map.insert(
            "error".into(),
            self.error
                .as_ref()
                .map_or(Value::Null, |e| Value::String(e.to_string())),
        );
        Value::Object(map)
    }
}

/// The union of current properties and local state seen by transforms.
///
/// Lookups consult local state fields first and fall back to properties.
#[derive(Debug, Clone, Copy)]
pub struct ExternalState<'a> {
    props: &'a PropertySet,
    state: &'a LocalState,
}

impl<'a> ExternalState<'a> {
    /// Combine properties and state.
    pub fn new(props: &'a PropertySet, state: &'a LocalState) -> Self {
        Self { props, state }
    }

    /// Look up a key in state fields, then in properties.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.state.get(key).or_else(|| self.props.get(key))
    }

    /// The current properties.
    pub fn props(&self) -> &'a PropertySet {
        self.props
    }

    /// The current local state.
    pub fn state(&self) -> &'a LocalState {
        self.state
    }
}

struct Snapshot {
    props: PropertySet,
    state: LocalState,
}

/// Shared, teardown-aware home of one instance's local state.
pub(crate) struct StateCell {
    inner: Mutex<Snapshot>,
    disposed: AtomicBool,
    changed: Signal<LocalState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Snapshot {
                props: PropertySet::new(),
                state: LocalState::default(),
            }),
            disposed: AtomicBool::new(false),
            changed: Signal::new(),
        }
    }

    pub(crate) fn set_props(&self, props: PropertySet) {
        self.inner.lock().props = props;
    }

    pub(crate) fn state(&self) -> LocalState {
        self.inner.lock().state.clone()
    }

    /// Clone the current props and state so a transform can run unlocked.
    pub(crate) fn external(&self) -> (PropertySet, LocalState) {
        let inner = self.inner.lock();
        (inner.props.clone(), inner.state.clone())
    }

    pub(crate) fn changed(&self) -> &Signal<LocalState> {
        &self.changed
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Refuse all further writes. Waits for a write in progress to finish.
    pub(crate) fn dispose(&self) {
        {
            let _inner = self.inner.lock();
            self.disposed.store(true, Ordering::Release);
        }
        self.changed.disconnect_all();
    }

    /// Run `f` with no write in progress.
    pub(crate) fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _inner = self.inner.lock();
        f()
    }

    /// Apply a write and notify listeners.
    ///
    /// Returns `false`, without touching the state, once the cell is disposed.
    pub(crate) fn update(&self, source: &str, write: impl FnOnce(&mut LocalState)) -> bool {
        self.update_if(source, || true, write) == Write::Applied
    }

    /// Apply a write only if `guard` holds, checked under the state lock.
    pub(crate) fn update_if(
        &self,
        source: &str,
        guard: impl FnOnce() -> bool,
        write: impl FnOnce(&mut LocalState),
    ) -> Write {
        let snapshot = {
            let mut inner = self.inner.lock();
            if self.disposed.load(Ordering::Acquire) {
                None
            } else if !guard() {
                return Write::Rejected;
            } else {
                write(&mut inner.state);
                Some(inner.state.clone())
            }
        };

        let Some(snapshot) = snapshot else {
            tracing::warn!(
                target: "lattice_bind::state",
                source,
                "dropping state write after teardown"
            );
            return Write::Disposed;
        };
        tracing::trace!(target: "lattice_bind::state", source, status = ?snapshot.status(), "state updated");
        self.changed.emit(snapshot);
        Write::Applied
    }
}

/// How a guarded write ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Write {
    Applied,
    Disposed,
    Rejected,
}
