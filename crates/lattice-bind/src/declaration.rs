//! Declarations of a component's data needs.
//!
//! A [`DataSpec`] lists everything one component asks for: an optional
//! primary query run on mount, named queries and mutations exposed as bound
//! callables, and named subscriptions kept alive while mounted.
//!
//! # Example
//!
//! ```
//! use lattice_bind::{DataSpec, QueryDeclaration, SubscriptionDeclaration, Variables};
//!
//! let spec = DataSpec::new()
//!     .query("query User($id: ID!) { name }")
//!     .variables(|props| Variables::new().forward(props, "id"))
//!     .mutation("rename", "mutation Rename($id: ID!, $name: String!) { rename }")
//!     .named_query(
//!         "refresh",
//!         QueryDeclaration::new("query Refresh { stamp }")
//!             .with_transform(|_, response| response.fields().clone()),
//!     )
//!     .subscription(
//!         "presence",
//!         SubscriptionDeclaration::new("subscription Presence { online }"),
//!     );
//!
//! assert!(spec.primary_query().is_some());
//! assert_eq!(spec.mutations().len(), 1);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::executor::NormalizedResponse;
use crate::resolver::VariableBuilder;
use crate::state::ExternalState;
use crate::value::{Fields, PropertySet, Variables};

/// Maps a normalized response to fields merged into local state.
pub type Transform = Arc<dyn Fn(&ExternalState<'_>, &NormalizedResponse) -> Fields + Send + Sync>;

/// Maps a subscription payload to fields merged into local state.
pub type DataTransform = Arc<dyn Fn(&ExternalState<'_>, &Value) -> Fields + Send + Sync>;

/// A query or mutation document with an optional response transform.
#[derive(Clone)]
pub struct QueryDeclaration {
    /// The request document.
    pub document: String,
    /// Optional transform applied after each response.
    pub transform: Option<Transform>,
}

impl QueryDeclaration {
    /// Declare a document without a transform.
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            transform: None,
        }
    }

    /// Attach a response transform.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&ExternalState<'_>, &NormalizedResponse) -> Fields + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }
}

impl fmt::Debug for QueryDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDeclaration")
            .field("document", &self.document)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// A query or mutation declaration: either a bare document or a full
/// declaration with a transform.
#[derive(Debug, Clone)]
pub enum Declaration {
    /// Just the document; no transform.
    Document(String),
    /// Document plus transform.
    Full(QueryDeclaration),
}

impl Declaration {
    /// Normalize into a [`QueryDeclaration`].
    pub fn normalize(&self) -> QueryDeclaration {
        match self {
            Self::Document(document) => QueryDeclaration::new(document.clone()),
            Self::Full(declaration) => declaration.clone(),
        }
    }
}

impl From<&str> for Declaration {
    fn from(document: &str) -> Self {
        Self::Document(document.to_owned())
    }
}

impl From<String> for Declaration {
    fn from(document: String) -> Self {
        Self::Document(document)
    }
}

impl From<QueryDeclaration> for Declaration {
    fn from(declaration: QueryDeclaration) -> Self {
        Self::Full(declaration)
    }
}

/// A live subscription declaration.
#[derive(Clone)]
pub struct SubscriptionDeclaration {
    /// The subscription document.
    pub document: String,
    /// Builder for the subscription's variables.
    pub variables: Option<VariableBuilder>,
    /// Optional transform applied to each payload.
    pub transform: Option<DataTransform>,
}

impl SubscriptionDeclaration {
    /// Declare a subscription without variables or transform.
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            variables: None,
            transform: None,
        }
    }

    /// Derive variables from properties.
    pub fn with_variables<F>(mut self, builder: F) -> Self
    where
        F: Fn(&PropertySet) -> Variables + Send + Sync + 'static,
    {
        self.variables = Some(Arc::new(builder));
        self
    }

    /// Attach a payload transform. Without one, each payload is stored in
    /// local state under the subscription's name.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&ExternalState<'_>, &Value) -> Fields + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }
}

impl fmt::Debug for SubscriptionDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionDeclaration")
            .field("document", &self.document)
            .field("variables", &self.variables.is_some())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Every data need of one component.
#[derive(Clone, Default)]
pub struct DataSpec {
    query: Option<String>,
    variables: Option<VariableBuilder>,
    mutations: BTreeMap<String, Declaration>,
    queries: BTreeMap<String, Declaration>,
    subscriptions: BTreeMap<String, SubscriptionDeclaration>,
}

impl DataSpec {
    /// Create an empty set of declarations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary query, run on mount and whenever its variables change.
    pub fn query(mut self, document: impl Into<String>) -> Self {
        self.query = Some(document.into());
        self
    }

    /// Set the primary query's variable builder.
    pub fn variables<F>(mut self, builder: F) -> Self
    where
        F: Fn(&PropertySet) -> Variables + Send + Sync + 'static,
    {
        self.variables = Some(Arc::new(builder));
        self
    }

    /// Add a named mutation.
    pub fn mutation(mut self, name: impl Into<String>, declaration: impl Into<Declaration>) -> Self {
        self.mutations.insert(name.into(), declaration.into());
        self
    }

    /// Add a named query callable.
    pub fn named_query(
        mut self,
        name: impl Into<String>,
        declaration: impl Into<Declaration>,
    ) -> Self {
        self.queries.insert(name.into(), declaration.into());
        self
    }

    /// Add a named subscription.
    pub fn subscription(
        mut self,
        name: impl Into<String>,
        declaration: SubscriptionDeclaration,
    ) -> Self {
        self.subscriptions.insert(name.into(), declaration);
        self
    }

    /// The primary query document.
    pub fn primary_query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The primary query's variable builder.
    pub fn variable_builder(&self) -> Option<&VariableBuilder> {
        self.variables.as_ref()
    }

    /// Declared mutations.
    pub fn mutations(&self) -> &BTreeMap<String, Declaration> {
        &self.mutations
    }

    /// Declared query callables.
    pub fn queries(&self) -> &BTreeMap<String, Declaration> {
        &self.queries
    }

    /// Declared subscriptions.
    pub fn subscriptions(&self) -> &BTreeMap<String, SubscriptionDeclaration> {
        &self.subscriptions
    }
}

impl fmt::Debug for DataSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSpec")
            .field("query", &self.query)
            .field("variables", &self.variables.is_some())
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .field("queries", &self.queries.keys().collect::<Vec<_>>())
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_document_normalizes_without_transform() {
        let declaration = Declaration::from("mutation { ping }");
        let normalized = declaration.normalize();
        assert_eq!(normalized.document, "mutation { ping }");
        assert!(normalized.transform.is_none());
    }

    #[test]
    fn test_full_declaration_keeps_transform() {
        let declaration: Declaration = QueryDeclaration::new("query { a }")
            .with_transform(|_, _| Fields::new())
            .into();
        assert!(declaration.normalize().transform.is_some());
    }

    #[test]
    fn test_spec_builder() {
        let spec = DataSpec::new()
            .mutation("save", "mutation { save }")
            .named_query("load", "query { load }")
            .subscription("feed", SubscriptionDeclaration::new("subscription { feed }"));

        assert!(spec.primary_query().is_none());
        assert!(spec.variable_builder().is_none());
        assert!(spec.mutations().contains_key("save"));
        assert!(spec.queries().contains_key("load"));
        assert!(spec.subscriptions().contains_key("feed"));
    }
}
