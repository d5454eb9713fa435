//! Subscription establishment, replacement and disposal.

use std::sync::{Arc, Barrier};
use std::thread;

use serde_json::json;

use lattice_bind::testing::{ClientCall, RecordingClient};
use lattice_bind::{
    DataController, DataSpec, Fields, PropertySet, SubscriptionDeclaration, SubscriptionEvent,
    Variables,
};

fn props(id: i64) -> PropertySet {
    PropertySet::new().with("id", id)
}

fn feed_spec() -> DataSpec {
    DataSpec::new()
        .subscription(
            "messages",
            SubscriptionDeclaration::new("subscription Messages($room: ID!) { message }")
                .with_variables(|props| Variables::new().forward_as(props, "id", "room")),
        )
        .subscription("heartbeat", SubscriptionDeclaration::new("subscription { beat }"))
}

#[tokio::test]
async fn test_mount_establishes_every_subscription() {
    let client = RecordingClient::new();
    let mut controller = DataController::new(feed_spec(), Arc::new(client.clone()));

    controller.mount(props(7)).unwrap();

    assert_eq!(client.subscribe_count(), 2);
    assert_eq!(controller.subscriptions().len(), 2);
    assert!(controller.subscriptions().contains("messages"));
    assert!(controller.subscriptions().contains("heartbeat"));
    assert!(client.calls().contains(&ClientCall::Subscribe {
        document: "subscription Messages($room: ID!) { message }".into(),
        variables: Some(json!({"room": 7})),
        handle: controller.subscriptions().handle("messages").unwrap().id(),
    }));
}

#[tokio::test]
async fn test_payload_merges_under_subscription_name() {
    let client = RecordingClient::new();
    let mut controller = DataController::new(feed_spec(), Arc::new(client.clone()));
    controller.mount(props(7)).unwrap();

    let handle = controller.subscriptions().handle("messages").unwrap().id();
    assert!(client.push(handle, json!({"message": "hi"})));

    assert_eq!(
        controller.state().get("messages"),
        Some(&json!({"message": "hi"}))
    );
    assert!(controller.state().get("heartbeat").is_none());
}

#[tokio::test]
async fn test_transform_sees_props_and_merges_result() {
    let client = RecordingClient::new();
    let spec = DataSpec::new().subscription(
        "count",
        SubscriptionDeclaration::new("subscription { count }").with_transform(|external, data| {
            let mut fields = Fields::new();
            fields.insert("count".into(), data["count"].clone());
            fields.insert("owner".into(), external.get("id").cloned().unwrap_or_default());
            fields
        }),
    );
    let mut controller = DataController::new(spec, Arc::new(client.clone()));
    controller.mount(props(3)).unwrap();

    let handle = controller.subscriptions().handle("count").unwrap().id();
    client.push(handle, json!({"count": 41}));
    client.push(handle, json!({"count": 42}));

    let state = controller.state();
    assert_eq!(state.get("count"), Some(&json!(42)));
    assert_eq!(state.get("owner"), Some(&json!(3)));
}

#[tokio::test]
async fn test_update_without_variable_change_keeps_subscriptions() {
    let client = RecordingClient::new();
    let mut controller = DataController::new(feed_spec(), Arc::new(client.clone()));
    controller.mount(props(7)).unwrap();

    controller.update(props(7).with("theme", "dark")).unwrap();

    assert_eq!(client.subscribe_count(), 2);
    assert_eq!(client.unsubscribe_count(), 0);
}

#[tokio::test]
async fn test_variable_change_unsubscribes_before_resubscribing() {
    let client = RecordingClient::new();
    let mut controller = DataController::new(feed_spec(), Arc::new(client.clone()));
    controller.mount(props(7)).unwrap();
    let old = controller.subscriptions().handle("messages").unwrap().id();
    let heartbeat = controller.subscriptions().handle("heartbeat").unwrap().id();

    controller.update(props(8)).unwrap();

    let new = controller.subscriptions().handle("messages").unwrap().id();
    assert_ne!(old, new);
    // A subscription without a variable builder is never replaced.
    assert_eq!(
        controller.subscriptions().handle("heartbeat").unwrap().id(),
        heartbeat
    );

    let calls = client.calls();
    let unsubscribed = calls
        .iter()
        .position(|call| *call == ClientCall::Unsubscribe { handle: old })
        .expect("old handle unsubscribed");
    let resubscribed = calls
        .iter()
        .position(|call| matches!(call, ClientCall::Subscribe { handle, .. } if *handle == new))
        .expect("new handle subscribed");
    assert!(unsubscribed < resubscribed);
    assert_eq!(
        calls[resubscribed],
        ClientCall::Subscribe {
            document: "subscription Messages($room: ID!) { message }".into(),
            variables: Some(json!({"room": 8})),
            handle: new,
        }
    );
}

#[tokio::test]
async fn test_late_payload_for_replaced_subscription_is_dropped() {
    let client = RecordingClient::new();
    let mut controller = DataController::new(feed_spec(), Arc::new(client.clone()));
    controller.mount(props(7)).unwrap();

    let old = controller.subscriptions().handle("messages").unwrap().id();
    let stale = client.callback(old).unwrap();
    controller.update(props(8)).unwrap();

    stale(SubscriptionEvent::Data(json!({"message": "from room 7"})));
    assert!(controller.state().get("messages").is_none());

    let new = controller.subscriptions().handle("messages").unwrap().id();
    client.push(new, json!({"message": "from room 8"}));
    assert_eq!(
        controller.state().get("messages"),
        Some(&json!({"message": "from room 8"}))
    );
}

/// A "messages" subscription whose transform parks on `entered`/`release`
/// while handling a payload marked `slow`.
fn parking_spec(entered: Arc<Barrier>, release: Arc<Barrier>) -> DataSpec {
    DataSpec::new().subscription(
        "messages",
        SubscriptionDeclaration::new("subscription Messages($room: ID!) { message }")
            .with_variables(|props| Variables::new().forward_as(props, "id", "room"))
            .with_transform(move |_, data| {
                if data["slow"] == json!(true) {
                    entered.wait();
                    release.wait();
                }
                let mut fields = Fields::new();
                fields.insert("messages".into(), data.clone());
                fields
            }),
    )
}

#[test]
fn test_payload_in_transform_during_replacement_is_dropped() {
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let client = RecordingClient::new();
    let spec = parking_spec(entered.clone(), release.clone());
    let mut controller = DataController::new(spec, Arc::new(client.clone()));
    controller.mount(props(7)).unwrap();

    let old = controller.subscriptions().handle("messages").unwrap().id();
    let stale = client.callback(old).unwrap();
    let delivery = thread::spawn(move || {
        stale(SubscriptionEvent::Data(json!({"room": 7, "slow": true})));
    });

    entered.wait();
    controller.update(props(8)).unwrap();
    assert!(client.calls().contains(&ClientCall::Unsubscribe { handle: old }));
    release.wait();
    delivery.join().unwrap();

    assert!(controller.state().get("messages").is_none());

    let new = controller.subscriptions().handle("messages").unwrap().id();
    client.push(new, json!({"room": 8}));
    assert_eq!(controller.state().get("messages"), Some(&json!({"room": 8})));
}

#[test]
fn test_payload_in_transform_during_teardown_is_dropped() {
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let client = RecordingClient::new();
    let spec = parking_spec(entered.clone(), release.clone());
    let mut controller = DataController::new(spec, Arc::new(client.clone()));
    controller.mount(props(7)).unwrap();

    let handle = controller.subscriptions().handle("messages").unwrap().id();
    let callback = client.callback(handle).unwrap();
    let delivery = thread::spawn(move || {
        callback(SubscriptionEvent::Data(json!({"room": 7, "slow": true})));
    });

    entered.wait();
    controller.teardown();
    release.wait();
    delivery.join().unwrap();

    assert!(controller.state().get("messages").is_none());
}

#[tokio::test]
async fn test_error_and_complete_leave_state_untouched() {
    let client = RecordingClient::new();
    let mut controller = DataController::new(feed_spec(), Arc::new(client.clone()));
    controller.mount(props(7)).unwrap();
    let handle = controller.subscriptions().handle("messages").unwrap().id();

    client.emit(handle, SubscriptionEvent::Error("room closed".into()));
    client.emit(handle, SubscriptionEvent::Complete);

    let state = controller.state();
    assert!(state.error.is_none());
    assert!(state.fields().is_empty());
}

#[tokio::test]
async fn test_teardown_disposes_each_handle_once() {
    let client = RecordingClient::new();
    let mut controller = DataController::new(feed_spec(), Arc::new(client.clone()));
    controller.mount(props(7)).unwrap();
    controller.update(props(8)).unwrap();

    controller.teardown();
    controller.teardown();
    drop(controller);

    // One replacement plus two handles held at teardown.
    assert_eq!(client.unsubscribe_count(), 3);
    assert!(client.live_handles().is_empty());

    let mut handles: Vec<u64> = client
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ClientCall::Unsubscribe { handle } => Some(handle),
            _ => None,
        })
        .collect();
    handles.sort_unstable();
    handles.dedup();
    assert_eq!(handles.len(), 3);
}

#[tokio::test]
async fn test_payload_after_teardown_is_dropped() {
    let client = RecordingClient::new();
    let mut controller = DataController::new(feed_spec(), Arc::new(client.clone()));
    controller.mount(props(7)).unwrap();
    let handle = controller.subscriptions().handle("heartbeat").unwrap().id();
    let stale = client.callback(handle).unwrap();

    controller.teardown();
    stale(SubscriptionEvent::Data(json!({"beat": 1})));

    assert!(controller.state().get("heartbeat").is_none());
    assert!(controller.subscriptions().is_empty());
}

#[tokio::test]
async fn test_drop_unsubscribes() {
    let client = RecordingClient::new();
    {
        let mut controller = DataController::new(feed_spec(), Arc::new(client.clone()));
        controller.mount(props(7)).unwrap();
    }
    assert_eq!(client.unsubscribe_count(), 2);
}

#[tokio::test]
async fn test_client_without_subscription_support() {
    let client = RecordingClient::without_subscriptions();
    let mut controller = DataController::new(feed_spec(), Arc::new(client.clone()));

    controller.mount(props(7)).unwrap();
    controller.update(props(8)).unwrap();
    controller.teardown();

    assert!(client.calls().is_empty());
    assert!(controller.subscriptions().is_empty());
}

#[tokio::test]
async fn test_failed_subscribe_is_not_tracked() {
    let client = RecordingClient::new();
    client.fail_subscriptions(true);
    let mut controller = DataController::new(feed_spec(), Arc::new(client.clone()));

    controller.mount(props(7)).unwrap();
    assert!(controller.subscriptions().is_empty());

    client.fail_subscriptions(false);
    controller.update(props(8)).unwrap();
    assert_eq!(controller.subscriptions().ids().collect::<Vec<_>>(), vec!["messages"]);

    controller.teardown();
    assert_eq!(client.unsubscribe_count(), 1);
}
