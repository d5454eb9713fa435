//! Declarative data bindings for Horizon Lattice components.
//!
//! This crate reconciles a component's declared data needs with the
//! properties it is rendered with:
//!
//! - **Primary query**: issued on mount and whenever its variables change,
//!   tracked as `loading`/`loaded`/`error` in local state
//! - **Bound queries and mutations**: named callables the component invokes
//!   with explicit variables
//! - **Subscriptions**: kept alive while mounted, replaced when their
//!   variables change, disposed on teardown
//!
//! Variables are derived from properties by pure builder functions and
//! compared with shallow equality (see [`Variables::shallow_eq`]); unchanged
//! variables never cause a request.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use lattice_bind::{DataClient, DataController, DataSpec, PropertySet, Variables};
//!
//! # async fn run(client: Arc<dyn DataClient>) -> lattice_bind::Result<()> {
//! let spec = DataSpec::new()
//!     .query("query User($id: ID!) { user(id: $id) { name } }")
//!     .variables(|props| Variables::new().forward(props, "id"))
//!     .mutation("rename", "mutation Rename($id: ID!, $name: String!) { rename(id: $id, name: $name) }");
//!
//! let mut controller = DataController::new(spec, client);
//! controller.state_changed().connect(|state| {
//!     println!("re-render with {}", state.to_json());
//! });
//!
//! if let Some(pending) = controller.mount(PropertySet::new().with("id", 1))? {
//!     pending.wait().await;
//! }
//!
//! let output = controller.render();
//! output
//!     .call("rename", Variables::new().with("id", 1).with("name", "Ada"))
//!     .await?;
//!
//! controller.teardown();
//! # Ok(())
//! # }
//! ```
//!
//! # Clients
//!
//! The controller talks to a [`DataClient`]. `lattice-bind-graphql` provides
//! one over GraphQL HTTP and websockets; the `test-util` feature provides
//! [`testing::RecordingClient`].

pub mod binder;
pub mod change;
pub mod client;
pub mod config;
mod controller;
pub mod declaration;
mod error;
pub mod executor;
pub mod logging;
pub mod query;
pub mod resolver;
pub mod signal;
pub mod state;
pub mod subscription;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod value;

pub use binder::{BoundRequest, BoundRequests, RequestBinder};
pub use client::{
    DataClient, QueryFuture, Response, ResponseError, SubscriptionCallback, SubscriptionEvent,
    SubscriptionHandle, Subscriptions,
};
pub use config::{ConsistencyPolicy, ControllerConfig};
pub use controller::{DataController, RenderOutput};
pub use declaration::{DataSpec, Declaration, QueryDeclaration, SubscriptionDeclaration};
pub use error::{BindError, Result};
pub use executor::{NormalizedResponse, RequestExecutor};
pub use query::{PendingQuery, QueryLifecycleController, QueryOutcome};
pub use resolver::VariableBuilder;
pub use signal::{ConnectionId, Signal};
pub use state::{ExternalState, LocalState, QueryStatus};
pub use subscription::{SubscriptionLifecycleController, SubscriptionTable};
pub use value::{Fields, PropertySet, SharedValue, Variables};
