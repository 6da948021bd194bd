//! Event pipeline and subscriber delivery, observed together: what a
//! connected browser actually receives when events and agent patches
//! land on an instance.

use patchboard::event::{handle_event, UiEvent};
use patchboard::patch::{PatchOp, SchemaPatch};
use patchboard::runtime::{OutboundMessage, Runtime};
use patchboard::schema::UiSchema;
use serde_json::json;

fn runtime() -> Runtime {
    let mut rt = Runtime::new("A");
    let schema: UiSchema = serde_json::from_value(json!({
        "page_key": "A",
        "state": {"params": {"counter": 0}, "runtime": {}},
        "actions": [
            {"id": "to_b", "label": "Go", "action_type": "navigate", "target_instance": "B"},
            {"id": "bump", "label": "Bump", "patches": [
                {"op": "increment", "path": "state.params.counter", "value": 1}
            ]}
        ]
    }))
    .unwrap();
    rt.store.set("A", schema);
    rt.store.set("B", UiSchema::new("B"));
    rt
}

fn event(ty: &str, payload: serde_json::Value) -> UiEvent {
    serde_json::from_value(json!({"type": ty, "payload": payload, "pageKey": "A"})).unwrap()
}

#[test]
fn navigation_leaves_the_instance_and_its_subscribers_alone() {
    let mut rt = runtime();
    let (_id, mut rx, _initial) = rt.subscribe("A").unwrap();
    let before = rt.schema("A").unwrap().clone();

    let out = handle_event(&mut rt, &event("action:click", json!({"actionId": "to_b"}))).unwrap();

    assert_eq!(out.navigate_to.as_deref(), Some("B"));
    assert_eq!(rt.schema("A").unwrap(), &before);
    assert_eq!(rt.history.count("A"), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn subscribers_see_patches_as_a_contiguous_suffix_of_history() {
    let mut rt = runtime();
    let bump = SchemaPatch::new(PatchOp::Increment, "state.params.counter", json!(1));

    // One patch lands before the subscription.
    rt.apply_and_deliver("A", std::slice::from_ref(&bump)).unwrap();
    let (_id, mut rx, initial) = rt.subscribe("A").unwrap();
    assert_eq!(initial["state"]["params"]["counter"], json!(1));

    rt.apply_and_deliver("A", std::slice::from_ref(&bump)).unwrap();
    rt.apply_and_deliver("A", std::slice::from_ref(&bump)).unwrap();

    let mut seen = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let OutboundMessage::Patch { patch_id: Some(id), .. } = msg {
            seen.push(id);
        }
    }
    assert_eq!(seen, vec![2, 3]);
}

#[test]
fn action_patches_reach_the_subscriber() {
    let mut rt = runtime();
    let (_id, mut rx, _initial) = rt.subscribe("A").unwrap();

    handle_event(&mut rt, &event("action:click", json!({"actionId": "bump"}))).unwrap();

    match rx.try_recv().unwrap() {
        OutboundMessage::Patch { instance, patch, .. } => {
            assert_eq!(instance, "A");
            assert_eq!(patch.path, "state.params.counter");
        }
        other => panic!("expected a patch message, got {other:?}"),
    }
}

#[test]
fn access_broadcasts_switch_instance_to_every_subscriber() {
    let mut rt = runtime();
    let (_ida, mut rx_a, _) = rt.subscribe("A").unwrap();
    let (_idb, mut rx_b, _) = rt.subscribe("B").unwrap();

    rt.access("B").unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        match rx.try_recv().unwrap() {
            OutboundMessage::SwitchInstance { instance, schema } => {
                assert_eq!(instance, "B");
                assert_eq!(schema["page_key"], json!("B"));
            }
            other => panic!("expected switch_instance, got {other:?}"),
        }
    }
}

#[test]
fn dropped_subscriber_is_pruned_on_next_send() {
    let mut rt = runtime();
    let (_id, rx, _initial) = rt.subscribe("A").unwrap();
    assert_eq!(rt.connections.connection_count("A"), 1);
    drop(rx);

    rt.apply_and_deliver(
        "A",
        &[SchemaPatch::new(PatchOp::Increment, "state.params.counter", json!(1))],
    )
    .unwrap();
    assert_eq!(rt.connections.connection_count("A"), 0);
}

#[test]
fn structural_agent_patch_ships_one_schema_update() {
    let mut rt = runtime();
    let (_id, mut rx, _initial) = rt.subscribe("A").unwrap();

    rt.apply_and_deliver(
        "A",
        &[
            SchemaPatch::new(
                PatchOp::Add,
                "blocks",
                json!({"id": "form", "props": {"fields": [
                    {"type": "text", "key": "name", "label": "Name"}
                ]}}),
            ),
            SchemaPatch::set("state.params.name", json!("Ann")),
        ],
    )
    .unwrap();

    match rx.try_recv().unwrap() {
        OutboundMessage::SchemaUpdate { schema, .. } => {
            assert_eq!(schema["blocks"][0]["id"], json!("form"));
            assert_eq!(schema["state"]["params"]["name"], json!("Ann"));
        }
        other => panic!("expected schema_update, got {other:?}"),
    }
    // The whole batch collapses into that one snapshot.
    assert!(rx.try_recv().is_err());
}
