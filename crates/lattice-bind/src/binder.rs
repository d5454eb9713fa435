//! Bound query and mutation callables.

use std::collections::BTreeMap;
use std::fmt;

use futures_util::future::BoxFuture;

use crate::declaration::{Declaration, QueryDeclaration};
use crate::error::Result;
use crate::executor::{NormalizedResponse, RequestExecutor};
use crate::value::Variables;

/// A declared query or mutation, ready to be called with variables.
#[derive(Clone)]
pub struct BoundRequest {
    name: String,
    declaration: QueryDeclaration,
    executor: RequestExecutor,
}

impl BoundRequest {
    /// The declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The request document.
    pub fn document(&self) -> &str {
        &self.declaration.document
    }

    /// Issue the request.
    ///
    /// The client is called immediately. Failures are returned to the caller
    /// and never recorded in local state; the declaration's transform, if
    /// any, merges into local state on success.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let output = controller.render();
    /// let rename = output.mutations.get("rename").unwrap();
    /// let response = rename.call(Variables::new().with("name", "Ada")).await?;
    /// ```
    pub fn call(
        &self,
        variables: impl Into<Option<Variables>>,
    ) -> BoxFuture<'static, Result<NormalizedResponse>> {
        let variables = variables.into();
        tracing::debug!(target: "lattice_bind::binder", name = %self.name, "calling bound request");
        self.executor.execute(
            &self.declaration.document,
            variables,
            self.declaration.transform.clone(),
        )
    }
}

impl fmt::Debug for BoundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundRequest")
            .field("name", &self.name)
            .field("declaration", &self.declaration)
            .finish()
    }
}

/// A named set of bound requests.
#[derive(Debug, Clone, Default)]
pub struct BoundRequests {
    entries: BTreeMap<String, BoundRequest>,
}

impl BoundRequests {
    /// Get a bound request by name.
    pub fn get(&self, name: &str) -> Option<&BoundRequest> {
        self.entries.get(name)
    }

    /// Whether a request is bound under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Bound names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of bound requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turns declarations into [`BoundRequests`].
#[derive(Clone)]
pub struct RequestBinder {
    executor: RequestExecutor,
}

impl RequestBinder {
    pub(crate) fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Bind every declaration, normalizing bare documents.
    pub fn bind(&self, declarations: &BTreeMap<String, Declaration>) -> BoundRequests {
        let entries = declarations
            .iter()
            .map(|(name, declaration)| {
                let bound = BoundRequest {
                    name: name.clone(),
                    declaration: declaration.normalize(),
                    executor: self.executor.clone(),
                };
                (name.clone(), bound)
            })
            .collect();
        BoundRequests { entries }
    }
}
