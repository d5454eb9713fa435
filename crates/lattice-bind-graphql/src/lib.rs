//! GraphQL transport for Lattice Bind.
//!
//! [`GraphQLClient`] implements [`lattice_bind::DataClient`]: queries and
//! mutations are posted as JSON to an HTTP endpoint, and subscriptions run
//! over websockets using the graphql-transport-ws protocol.
//!
//! ```ignore
//! use std::sync::Arc;
//! use lattice_bind::{DataController, DataSpec, PropertySet, SubscriptionDeclaration, Variables};
//! use lattice_bind_graphql::GraphQLClient;
//!
//! let client = GraphQLClient::builder("https://api.example.com/graphql")
//!     .bearer_auth(token)
//!     .build()?;
//!
//! let spec = DataSpec::new()
//!     .query("query Room($id: ID!) { room(id: $id) { title } }")
//!     .variables(|props| Variables::new().forward(props, "id"))
//!     .subscription(
//!         "messages",
//!         SubscriptionDeclaration::new("subscription Messages($id: ID!) { message(room: $id) }")
//!             .with_variables(|props| Variables::new().forward(props, "id")),
//!     );
//!
//! let mut controller = DataController::new(spec, Arc::new(client));
//! controller.mount(PropertySet::new().with("id", 42))?;
//! ```
//!
//! A response carrying only errors is reported as
//! [`BindError::Response`](lattice_bind::BindError::Response); transport
//! failures become [`BindError::Client`](lattice_bind::BindError::Client).

mod client;
mod error;
pub mod logging;
pub mod protocol;
mod session;

pub use client::{GraphQLClient, GraphQLClientBuilder};
pub use error::{Result, TransportError};
