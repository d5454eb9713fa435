//! Tracing targets and span names.
//!
//! Lattice Bind instruments itself with the `tracing` crate and never
//! installs a subscriber. Use these targets in filter directives to narrow
//! output to one part of the reconciliation:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("lattice_bind::subscription=debug,lattice_bind::query=debug")
//!     .init();
//! ```
//!
//! Lifecycle notifications and state transitions log at `debug`,
//! change-detection decisions at `trace`, and dropped post-teardown writes or
//! subscription failures at `warn`.

/// Target names for log filtering.
pub mod targets {
    /// Crate root target.
    pub const ROOT: &str = "lattice_bind";
    /// Mount, update and teardown notifications.
    pub const CONTROLLER: &str = "lattice_bind::controller";
    /// Primary query state machine.
    pub const QUERY: &str = "lattice_bind::query";
    /// Subscription create/replace/dispose.
    pub const SUBSCRIPTION: &str = "lattice_bind::subscription";
    /// Request execution.
    pub const EXECUTOR: &str = "lattice_bind::executor";
    /// Bound query and mutation calls.
    pub const BINDER: &str = "lattice_bind::binder";
    /// Variable change detection.
    pub const CHANGE: &str = "lattice_bind::change";
    /// Local state writes.
    pub const STATE: &str = "lattice_bind::state";
    /// State change notification.
    pub const SIGNAL: &str = "lattice_bind::signal";
}

/// Span names used by instrumented lifecycle entry points.
pub mod span_names {
    /// Instance mount.
    pub const MOUNT: &str = "mount";
    /// Property update.
    pub const UPDATE: &str = "update_from";
    /// Instance teardown.
    pub const TEARDOWN: &str = "teardown";
}
