//! A profile card bound to an in-memory user directory.
//!
//! Run with: RUST_LOG=lattice_bind=debug cargo run -p lattice-bind --example profile_card

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::{Value, json};

use lattice_bind::{
    BindError, DataClient, DataController, DataSpec, Fields, PropertySet, QueryDeclaration,
    QueryFuture, Response, Variables,
};

const USER_QUERY: &str = "query User($id: ID!) { user(id: $id) { name } }";
const RENAME: &str = "mutation Rename($id: ID!, $name: String!) { rename(id: $id, name: $name) }";

/// Serves `User` and `Rename` from a map.
#[derive(Default)]
struct Directory {
    users: Mutex<HashMap<i64, String>>,
}

impl Directory {
    fn answer(&self, document: &str, variables: &Value) -> Result<Value, BindError> {
        let id = variables["id"]
            .as_i64()
            .ok_or_else(|| BindError::client("missing id"))?;
        let mut users = self.users.lock();

        if document == USER_QUERY {
            let name = users
                .get(&id)
                .ok_or_else(|| BindError::client(format!("no user {id}")))?;
            Ok(json!({"user": {"name": name}}))
        } else if document == RENAME {
            let name = variables["name"].as_str().unwrap_or_default().to_owned();
            users.insert(id, name.clone());
            Ok(json!({"rename": name}))
        } else {
            Err(BindError::client("unknown document"))
        }
    }
}

impl DataClient for Directory {
    fn query(&self, document: &str, variables: Option<Value>) -> QueryFuture {
        let result = self
            .answer(document, &variables.unwrap_or_default())
            .map(Response::data);
        futures_util::future::ready(result).boxed()
    }
}

fn card(controller: &DataController) {
    let output = controller.render();
    let status = output.data.status();
    let name = output
        .data
        .get("user")
        .and_then(|user| user["name"].as_str())
        .unwrap_or("-");
    println!("[{status:?}] user #{} {name}", output.props.get("id").unwrap_or(&Value::Null));
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> lattice_bind::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let directory = Arc::new(Directory::default());
    directory.users.lock().extend([(1, "Ada".to_owned()), (2, "Grace".to_owned())]);

    let spec = DataSpec::new()
        .query(USER_QUERY)
        .variables(|props| Variables::new().forward(props, "id"))
        .mutation(
            "rename",
            QueryDeclaration::new(RENAME).with_transform(|_, response| {
                let mut fields = Fields::new();
                if let Some(name) = response.get("rename") {
                    fields.insert("user".into(), json!({"name": name}));
                }
                fields
            }),
        );

    let mut controller = DataController::new(spec, directory);
    controller.state_changed().connect(|state| println!("  state -> {}", state.to_json()));

    if let Some(pending) = controller.mount(PropertySet::new().with("id", 1))? {
        pending.wait().await;
    }
    card(&controller);

    // Only the theme changed; the query is not reissued.
    controller.update(PropertySet::new().with("id", 1).with("theme", "dark"))?;
    card(&controller);

    if let Some(pending) = controller.update(PropertySet::new().with("id", 2))? {
        pending.wait().await;
    }
    card(&controller);

    controller
        .render()
        .call("rename", Variables::new().with("id", 2).with("name", "Grace Hopper"))
        .await?;
    card(&controller);

    if let Some(pending) = controller.update(PropertySet::new().with("id", 3))? {
        pending.wait().await;
    }
    card(&controller);

    controller.teardown();
    Ok(())
}
