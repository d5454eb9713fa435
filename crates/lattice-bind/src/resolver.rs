//! Variable resolution from properties.

use std::sync::Arc;

use crate::value::{PropertySet, Variables};

/// A pure function deriving a request's variables from the current properties.
pub type VariableBuilder = Arc<dyn Fn(&PropertySet) -> Variables + Send + Sync>;

/// Wrap a closure as a [`VariableBuilder`].
///
/// # Example
///
/// ```
/// use lattice_bind::{resolver, PropertySet, Variables};
///
/// let builder = resolver::builder(|props| Variables::new().forward(props, "id"));
/// let vars = resolver::resolve(Some(&builder), &PropertySet::new().with("id", 4));
/// assert_eq!(vars.unwrap().get("id"), Some(&serde_json::json!(4)));
/// ```
pub fn builder<F>(f: F) -> VariableBuilder
where
    F: Fn(&PropertySet) -> Variables + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Resolve the variables for a request.
///
/// Returns `None` when no builder is declared. This is distinct from an empty
/// mapping: a request without a builder is sent without variables at all.
pub fn resolve(builder: Option<&VariableBuilder>, props: &PropertySet) -> Option<Variables> {
    builder.map(|build| build(props))
}
