//! Primary query lifecycle.
//!
//! The primary query is issued on mount and again on every property update
//! that changes its variables. Each issue moves local state to `loading`; the
//! completion moves it to `loaded` (merging the response data) or to an error.
//!
//! In-flight requests are never cancelled. Under
//! [`ConsistencyPolicy::LastWriteWins`] every completion writes state in
//! arrival order; under [`ConsistencyPolicy::LatestOnly`] completions of
//! superseded requests are discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::task::JoinHandle;

use crate::change;
use crate::config::{ConsistencyPolicy, ControllerConfig};
use crate::error::{BindError, Result};
use crate::executor::RequestExecutor;
use crate::resolver::{self, VariableBuilder};
use crate::state::{StateCell, Write};
use crate::value::PropertySet;

/// How a primary query request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The response was merged into state.
    Loaded,
    /// The failure was recorded in state.
    Failed(BindError),
    /// A newer request had been issued; the result was discarded.
    Superseded,
    /// The instance was torn down before the result arrived.
    Discarded,
}

/// A primary query request in flight.
///
/// Awaiting it is optional: dropping the handle does not cancel the request.
#[derive(Debug)]
pub struct PendingQuery {
    generation: u64,
    task: JoinHandle<QueryOutcome>,
}

impl PendingQuery {
    /// The request's generation; later requests have larger generations.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check whether the request has settled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the request to settle.
    ///
    /// Returns `None` if the task was aborted or panicked.
    pub async fn wait(self) -> Option<QueryOutcome> {
        self.task.await.ok()
    }
}

/// Drives the primary query state machine for one instance.
pub struct QueryLifecycleController {
    document: Option<String>,
    variables: Option<VariableBuilder>,
    executor: RequestExecutor,
    cell: Arc<StateCell>,
    config: ControllerConfig,
    generation: Arc<AtomicU64>,
    missed: AtomicBool,
}

impl QueryLifecycleController {
    pub(crate) fn new(
        document: Option<String>,
        variables: Option<VariableBuilder>,
        executor: RequestExecutor,
        cell: Arc<StateCell>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            document,
            variables,
            executor,
            cell,
            config,
            generation: Arc::new(AtomicU64::new(0)),
            missed: AtomicBool::new(false),
        }
    }

    /// Whether a primary query is declared.
    pub fn is_declared(&self) -> bool {
        self.document.is_some()
    }

    /// Number of requests issued so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Issue the query for a freshly mounted instance.
    pub fn on_mount(&self, props: &PropertySet) -> Result<Option<PendingQuery>> {
        let Some(document) = self.document.as_deref() else {
            return Ok(None);
        };
        self.issue(document, props).map(Some)
    }

    /// Reissue the query if the update changed its variables.
    ///
    /// A query that could not be issued earlier for lack of a runtime is
    /// issued on the next update even when its variables did not change.
    pub fn on_update(&self, prev: &PropertySet, next: &PropertySet) -> Result<Option<PendingQuery>> {
        let Some(document) = self.document.as_deref() else {
            return Ok(None);
        };
        if !self.missed.load(Ordering::SeqCst) && !change::changed(self.variables.as_ref(), prev, next) {
            tracing::trace!(target: "lattice_bind::query", "variables unchanged, keeping current result");
            return Ok(None);
        }
        self.issue(document, next).map(Some)
    }

    fn issue(&self, document: &str, props: &PropertySet) -> Result<PendingQuery> {
        let runtime = self.config.runtime_handle().inspect_err(|_| {
            self.missed.store(true, Ordering::SeqCst);
        })?;
        self.missed.store(false, Ordering::SeqCst);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.cell.update("query", |state| {
            state.loading = true;
            state.loaded = false;
        });
        tracing::debug!(target: "lattice_bind::query", generation, "primary query loading");

        let variables = resolver::resolve(self.variables.as_ref(), props);
        let request = self.executor.execute(document, variables, None);
        let cell = Arc::clone(&self.cell);
        let latest = Arc::clone(&self.generation);
        let consistency = self.config.consistency;
        let clear_error = self.config.clear_error_on_success;

        let task = runtime.spawn(async move {
            let result = request.await;
            let current = || {
                consistency == ConsistencyPolicy::LastWriteWins
                    || latest.load(Ordering::SeqCst) == generation
            };

            let (write, outcome) = match result {
                Ok(response) => {
                    let write = cell.update_if("query", current, |state| {
                        state.loading = false;
                        state.loaded = true;
                        if clear_error {
                            state.error = None;
                        }
                        state.merge(response.into_fields());
                    });
                    (write, QueryOutcome::Loaded)
                }
                Err(error) => {
                    let write = cell.update_if("query", current, |state| {
                        state.loading = false;
                        state.loaded = false;
                        state.error = Some(error.clone());
                    });
                    (write, QueryOutcome::Failed(error))
                }
            };

            match write {
                Write::Applied => {
                    tracing::debug!(target: "lattice_bind::query", generation, outcome = ?outcome, "primary query settled");
                    outcome
                }
                Write::Rejected => {
                    tracing::debug!(
                        target: "lattice_bind::query",
                        generation,
                        "discarding superseded primary query result"
                    );
                    QueryOutcome::Superseded
                }
                Write::Disposed => QueryOutcome::Discarded,
            }
        });

        Ok(PendingQuery { generation, task })
    }
}
