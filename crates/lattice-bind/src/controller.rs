//! The per-instance data controller.
//!
//! A [`DataController`] is created for each rendered component instance. The
//! rendering framework forwards three notifications to it:
//!
//! - [`mount`](DataController::mount) with the initial properties,
//! - [`update`](DataController::update) with each new property snapshot,
//! - [`teardown`](DataController::teardown) when the instance goes away.
//!
//! Between notifications it calls [`render`](DataController::render) to get
//! the properties, bound callables and local state to render with, and it may
//! connect to [`state_changed`](DataController::state_changed) to learn when
//! asynchronous results arrive.

use std::sync::Arc;

use crate::binder::{BoundRequest, BoundRequests, RequestBinder};
use crate::client::DataClient;
use crate::config::ControllerConfig;
use crate::declaration::DataSpec;
use crate::error::{BindError, Result};
use crate::executor::{NormalizedResponse, RequestExecutor};
use crate::query::{PendingQuery, QueryLifecycleController};
use crate::signal::Signal;
use crate::state::{LocalState, StateCell};
use crate::subscription::{SubscriptionLifecycleController, SubscriptionTable};
use crate::value::{PropertySet, Variables};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Mounted,
    TornDown,
}

/// Reconciles one component instance's data needs with its properties.
///
/// # Example
///
/// ```ignore
/// use lattice_bind::{DataController, DataSpec, PropertySet, Variables};
///
/// let spec = DataSpec::new()
///     .query("query User($id: ID!) { name }")
///     .variables(|props| Variables::new().forward(props, "id"));
///
/// let mut controller = DataController::new(spec, client);
/// controller.mount(PropertySet::new().with("id", 1))?;
///
/// // Same variables: nothing is refetched.
/// controller.update(PropertySet::new().with("id", 1))?;
///
/// // New variables: the query is issued again.
/// controller.update(PropertySet::new().with("id", 2))?;
///
/// controller.teardown();
/// ```
pub struct DataController {
    spec: DataSpec,
    cell: Arc<StateCell>,
    query: QueryLifecycleController,
    subscriptions: SubscriptionLifecycleController,
    binder: RequestBinder,
    props: PropertySet,
    phase: Phase,
}

impl DataController {
    /// Create a controller with the default configuration.
    pub fn new(spec: DataSpec, client: Arc<dyn DataClient>) -> Self {
        Self::with_config(spec, client, ControllerConfig::default())
    }

    /// Create a controller with a custom configuration.
    pub fn with_config(spec: DataSpec, client: Arc<dyn DataClient>, config: ControllerConfig) -> Self {
        let cell = Arc::new(StateCell::new());
        let executor = RequestExecutor::new(Arc::clone(&client), Arc::clone(&cell));
        let query = QueryLifecycleController::new(
            spec.primary_query().map(str::to_owned),
            spec.variable_builder().cloned(),
            executor.clone(),
            Arc::clone(&cell),
            config,
        );
        let subscriptions = SubscriptionLifecycleController::new(
            spec.subscriptions().clone(),
            client,
            Arc::clone(&cell),
        );

        Self {
            spec,
            cell,
            query,
            subscriptions,
            binder: RequestBinder::new(executor),
            props: PropertySet::new(),
            phase: Phase::Created,
        }
    }

    /// Handle the instance being mounted.
    ///
    /// Issues the primary query, if declared, and establishes every declared
    /// subscription. Mounting an already mounted instance is treated as an
    /// update.
    ///
    /// The returned [`PendingQuery`] resolves when the primary query settles.
    /// An error is returned only when the primary query could not be issued
    /// at all; subscriptions are established regardless.
    #[tracing::instrument(skip_all, target = "lattice_bind::controller", level = "debug")]
    pub fn mount(&mut self, props: PropertySet) -> Result<Option<PendingQuery>> {
        match self.phase {
            Phase::TornDown => return Err(BindError::Disposed),
            Phase::Mounted => {
                tracing::debug!(target: "lattice_bind::controller", "already mounted, treating as update");
                return self.update(props);
            }
            Phase::Created => {}
        }

        tracing::debug!(target: "lattice_bind::controller", props = ?props, "mounting");
        self.phase = Phase::Mounted;
        self.cell.set_props(props.clone());

        let pending = self.query.on_mount(&props);
        self.subscriptions.on_mount(&props);
        self.props = props;
        pending
    }

    /// Handle new properties, comparing against the previously received ones.
    ///
    /// Updating an instance that was never mounted mounts it.
    pub fn update(&mut self, next: PropertySet) -> Result<Option<PendingQuery>> {
        if self.phase == Phase::Created {
            return self.mount(next);
        }
        let prev = self.props.clone();
        self.update_from(&prev, next)
    }

    /// Handle a property update with an explicit previous snapshot.
    #[tracing::instrument(skip_all, target = "lattice_bind::controller", level = "debug")]
    pub fn update_from(&mut self, prev: &PropertySet, next: PropertySet) -> Result<Option<PendingQuery>> {
        match self.phase {
            Phase::TornDown => return Err(BindError::Disposed),
            Phase::Created => return self.mount(next),
            Phase::Mounted => {}
        }

        tracing::debug!(target: "lattice_bind::controller", props = ?next, "updating");
        self.cell.set_props(next.clone());

        let pending = self.query.on_update(prev, &next);
        self.subscriptions.on_update(prev, &next);
        self.props = next;
        pending
    }

    /// Handle the instance being torn down.
    ///
    /// Every live subscription is unsubscribed and later writes to local
    /// state, from requests still in flight or late subscription payloads,
    /// are dropped. Calling this more than once has no further effect.
    #[tracing::instrument(skip_all, target = "lattice_bind::controller", level = "debug")]
    pub fn teardown(&mut self) {
        if self.phase == Phase::TornDown {
            return;
        }
        tracing::debug!(
            target: "lattice_bind::controller",
            subscriptions = self.subscriptions.table().len(),
            "tearing down"
        );
        self.phase = Phase::TornDown;
        self.cell.dispose();
        self.subscriptions.teardown();
    }

    /// Whether the instance is mounted.
    pub fn is_mounted(&self) -> bool {
        self.phase == Phase::Mounted
    }

    /// Whether the instance has been torn down.
    pub fn is_torn_down(&self) -> bool {
        self.phase == Phase::TornDown
    }

    /// The most recently received properties.
    pub fn props(&self) -> &PropertySet {
        &self.props
    }

    /// A snapshot of the local state.
    pub fn state(&self) -> LocalState {
        self.cell.state()
    }

    /// Signal emitted with the new state after every state write.
    ///
    /// All connections are dropped on teardown.
    pub fn state_changed(&self) -> &Signal<LocalState> {
        self.cell.changed()
    }

    /// The live subscriptions.
    pub fn subscriptions(&self) -> &SubscriptionTable {
        self.subscriptions.table()
    }

    /// The primary query controller.
    pub fn primary_query(&self) -> &QueryLifecycleController {
        &self.query
    }

    /// Assemble what the component renders with.
    ///
    /// Bound callables are rebuilt on every call.
    pub fn render(&self) -> RenderOutput {
        RenderOutput {
            props: self.props.clone(),
            mutations: self.binder.bind(self.spec.mutations()),
            queries: self.binder.bind(self.spec.queries()),
            data: self.cell.state(),
        }
    }
}

impl Drop for DataController {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for DataController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataController")
            .field("phase", &self.phase)
            .field("spec", &self.spec)
            .field("props", &self.props)
            .field("subscriptions", self.subscriptions.table())
            .finish()
    }
}

/// What a component is rendered with.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// The current properties.
    pub props: PropertySet,
    /// Bound mutations.
    pub mutations: BoundRequests,
    /// Bound queries.
    pub queries: BoundRequests,
    /// The local state.
    pub data: LocalState,
}

impl RenderOutput {
    /// Look up a bound callable by name; queries shadow mutations.
    pub fn request(&self, name: &str) -> Option<&BoundRequest> {
        self.queries.get(name).or_else(|| self.mutations.get(name))
    }

    /// Call a bound query or mutation by name.
    pub async fn call(
        &self,
        name: &str,
        variables: impl Into<Option<Variables>>,
    ) -> Result<NormalizedResponse> {
        let request = self
            .request(name)
            .ok_or_else(|| BindError::UnknownRequest(name.to_owned()))?;
        request.call(variables).await
    }
}
