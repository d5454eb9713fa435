//! Tracing targets.

/// Target names for log filtering.
pub mod targets {
    /// Crate root target.
    pub const ROOT: &str = "lattice_bind_graphql";
    /// Query and mutation requests over HTTP.
    pub const HTTP: &str = "lattice_bind_graphql::http";
    /// Subscription sessions over websockets.
    pub const WS: &str = "lattice_bind_graphql::ws";
}
