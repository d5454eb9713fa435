//! Single request execution.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::client::{DataClient, Response, ResponseError};
use crate::declaration::Transform;
use crate::error::{BindError, Result};
use crate::state::{ExternalState, StateCell};
use crate::value::{Fields, Variables};

/// A response envelope flattened for merging into local state.
///
/// The fields of `data` become the response's fields; non-empty `errors` are
/// kept alongside and show up under an `errors` key when merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedResponse {
    fields: Fields,
    errors: Vec<ResponseError>,
}

impl NormalizedResponse {
    /// Normalize a client response.
    pub fn from_response(response: Response) -> Self {
        let fields = match response.data {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => Fields::new(),
            Some(other) => {
                tracing::debug!(
                    target: "lattice_bind::executor",
                    data = %other,
                    "ignoring non-object response data"
                );
                Fields::new()
            }
        };
        Self {
            fields,
            errors: response.errors,
        }
    }

    /// Fields of the response data.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Look up a data field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Errors reported with the response.
    pub fn errors(&self) -> &[ResponseError] {
        &self.errors
    }

    /// Whether errors were reported.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The fields to merge into state, with `errors` attached when present.
    pub fn into_fields(self) -> Fields {
        let mut fields = self.fields;
        if !self.errors.is_empty() {
            let errors = serde_json::to_value(&self.errors).unwrap_or(Value::Null);
            fields.insert("errors".into(), errors);
        }
        fields
    }

    /// The normalized response as one JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.clone().into_fields())
    }
}

/// Issues requests against the client on behalf of one instance.
#[derive(Clone)]
pub struct RequestExecutor {
    client: Arc<dyn DataClient>,
    cell: Arc<StateCell>,
}

impl RequestExecutor {
    pub(crate) fn new(client: Arc<dyn DataClient>, cell: Arc<StateCell>) -> Self {
        Self { client, cell }
    }

    /// Execute a document.
    ///
    /// The client is called before this returns; the returned future
    /// resolves with the normalized response. When a transform is given it
    /// runs against the current properties and state once the response
    /// arrives, and its fields are merged into local state. Client failures
    /// are returned unchanged; nothing is retried.
    pub fn execute(
        &self,
        document: &str,
        variables: Option<Variables>,
        transform: Option<Transform>,
    ) -> BoxFuture<'static, Result<NormalizedResponse>> {
        if self.cell.is_disposed() {
            tracing::debug!(target: "lattice_bind::executor", "refusing request after teardown");
            return futures_util::future::ready(Err(BindError::Disposed)).boxed();
        }

        tracing::debug!(
            target: "lattice_bind::executor",
            document,
            variables = ?variables,
            "issuing request"
        );
        let request = self
            .client
            .query(document, variables.as_ref().map(Variables::to_json));
        let cell = Arc::clone(&self.cell);

        async move {
            let response = request.await?;
            let normalized = NormalizedResponse::from_response(response);

            if let Some(transform) = transform {
                let (props, state) = cell.external();
                let fields = transform(&ExternalState::new(&props, &state), &normalized);
                cell.update("transform", |state| state.merge(fields));
            }

            Ok(normalized)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_data_fields() {
        let normalized = NormalizedResponse::from_response(Response::data(json!({"name": "a"})));
        assert_eq!(normalized.get("name"), Some(&json!("a")));
        assert!(!normalized.has_errors());
        assert_eq!(normalized.to_json(), json!({"name": "a"}));
    }

    #[test]
    fn test_normalize_attaches_errors() {
        let response = Response {
            data: Some(json!({"user": null})),
            errors: vec![ResponseError::new("denied")],
            extensions: None,
        };
        let normalized = NormalizedResponse::from_response(response);
        assert!(normalized.has_errors());
        assert_eq!(
            normalized.to_json(),
            json!({"user": null, "errors": [{"message": "denied"}]})
        );
    }

    #[test]
    fn test_normalize_missing_data() {
        let normalized = NormalizedResponse::from_response(Response::default());
        assert!(normalized.fields().is_empty());
        assert_eq!(normalized.to_json(), json!({}));
    }
}
