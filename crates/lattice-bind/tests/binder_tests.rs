//! Bound queries and mutations exposed through `render`.

use std::sync::Arc;

use serde_json::json;

use lattice_bind::testing::RecordingClient;
use lattice_bind::{
    BindError, DataController, DataSpec, Fields, PropertySet, QueryDeclaration, Response,
    ResponseError, Variables,
};

const RENAME: &str = "mutation Rename($name: String!) { rename(name: $name) { name } }";
const SEARCH: &str = "query Search($term: String!) { search(term: $term) }";

fn spec() -> DataSpec {
    DataSpec::new()
        .mutation("rename", RENAME)
        .named_query(
            "search",
            QueryDeclaration::new(SEARCH).with_transform(|external, response| {
                let mut fields = Fields::new();
                fields.insert("results".into(), response.get("search").cloned().unwrap_or_default());
                fields.insert("searchedBy".into(), external.get("user").cloned().unwrap_or_default());
                fields
            }),
        )
}

fn mounted(client: &RecordingClient) -> DataController {
    let mut controller = DataController::new(spec(), Arc::new(client.clone()));
    controller.mount(PropertySet::new().with("user", "ada")).unwrap();
    controller
}

#[tokio::test]
async fn test_render_exposes_bound_requests() {
    let client = RecordingClient::new();
    let controller = mounted(&client);

    let output = controller.render();
    assert_eq!(output.mutations.names().collect::<Vec<_>>(), vec!["rename"]);
    assert_eq!(output.queries.names().collect::<Vec<_>>(), vec!["search"]);
    assert_eq!(output.mutations.get("rename").unwrap().document(), RENAME);
    assert_eq!(output.props.get("user"), Some(&json!("ada")));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_mutation_forwards_variables_and_returns_response() {
    let client = RecordingClient::new();
    client.respond_with(Ok(Response::data(json!({"rename": {"name": "Ada"}}))));
    let controller = mounted(&client);

    let response = controller
        .render()
        .call("rename", Variables::new().with("name", "Ada"))
        .await
        .unwrap();

    assert_eq!(response.get("rename"), Some(&json!({"name": "Ada"})));
    assert_eq!(
        client.queries(),
        vec![(RENAME.to_string(), Some(json!({"name": "Ada"})))]
    );
    // Bare declarations carry no transform.
    assert!(controller.state().fields().is_empty());
}

#[tokio::test]
async fn test_client_is_called_before_awaiting() {
    let client = RecordingClient::new();
    let controller = mounted(&client);
    let output = controller.render();

    let call = output.mutations.get("rename").unwrap().call(None);
    assert_eq!(client.queries(), vec![(RENAME.to_string(), None)]);

    client.resolve_next(Response::data(json!({"rename": null})));
    assert!(call.await.is_ok());
}

#[tokio::test]
async fn test_failure_propagates_without_touching_state() {
    let client = RecordingClient::new();
    client.respond_with(Err(BindError::client("forbidden")));
    let controller = mounted(&client);

    let error = controller
        .render()
        .call("rename", Variables::new().with("name", "Ada"))
        .await
        .unwrap_err();

    assert_eq!(error, BindError::client("forbidden"));
    let state = controller.state();
    assert!(state.error.is_none());
    assert!(!state.loading);
    assert!(state.fields().is_empty());
}

#[tokio::test]
async fn test_transform_merges_into_state() {
    let client = RecordingClient::new();
    client.respond_with(Ok(Response::data(json!({"search": ["a", "b"]}))));
    let controller = mounted(&client);

    let response = controller
        .render()
        .call("search", Variables::new().with("term", "lattice"))
        .await
        .unwrap();

    assert_eq!(response.get("search"), Some(&json!(["a", "b"])));
    let state = controller.state();
    assert_eq!(state.get("results"), Some(&json!(["a", "b"])));
    assert_eq!(state.get("searchedBy"), Some(&json!("ada")));
}

#[tokio::test]
async fn test_response_errors_are_returned() {
    let client = RecordingClient::new();
    client.respond_with(Ok(Response::errors(vec![ResponseError::new("name taken")])));
    let controller = mounted(&client);

    let response = controller.render().call("rename", None).await.unwrap();

    assert!(response.has_errors());
    assert_eq!(response.errors()[0].message, "name taken");
    assert_eq!(
        response.to_json(),
        json!({"errors": [{"message": "name taken"}]})
    );
}

#[tokio::test]
async fn test_unknown_request_name() {
    let client = RecordingClient::new();
    let controller = mounted(&client);

    let error = controller.render().call("delete", None).await.unwrap_err();

    assert_eq!(error, BindError::UnknownRequest("delete".into()));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_queries_shadow_mutations() {
    let client = RecordingClient::new();
    let spec = DataSpec::new()
        .mutation("refresh", "mutation { refresh }")
        .named_query("refresh", "query { refresh }");
    let controller = DataController::new(spec, Arc::new(client.clone()));

    let output = controller.render();
    assert_eq!(output.request("refresh").unwrap().document(), "query { refresh }");
}

#[tokio::test]
async fn test_call_after_teardown_is_refused() {
    let client = RecordingClient::new();
    let mut controller = mounted(&client);
    let output = controller.render();
    controller.teardown();

    let error = output.call("rename", None).await.unwrap_err();

    assert_eq!(error, BindError::Disposed);
    assert!(client.calls().is_empty());
}
