//! End-to-end patch scenarios through the runtime: counter increments,
//! templated list appends, field-rename migration, row deletion and
//! list filtering.

use patchboard::patch::{apply_batch, PatchOp, SchemaPatch};
use patchboard::runtime::Runtime;
use patchboard::schema::UiSchema;
use serde_json::{json, Value};

fn runtime_with(params: Value) -> Runtime {
    let mut rt = Runtime::new("page");
    let schema: UiSchema = serde_json::from_value(json!({
        "page_key": "page",
        "state": {"params": params, "runtime": {}}
    }))
    .unwrap();
    rt.store.set("page", schema);
    rt
}

fn params<'a>(rt: &'a Runtime) -> &'a serde_json::Map<String, Value> {
    &rt.schema("page").unwrap().state.params
}

#[test]
fn counter_increments_accumulate_with_history() {
    let mut rt = runtime_with(json!({"counter": 0}));
    let patch = SchemaPatch::new(PatchOp::Increment, "state.params.counter", json!(1));
    for _ in 0..3 {
        rt.apply_and_deliver("page", std::slice::from_ref(&patch))
            .unwrap();
    }
    assert_eq!(params(&rt)["counter"], json!(3));
    assert_eq!(rt.history.count("page"), 3);
}

#[test]
fn templated_append_preserves_types_and_bumps_the_cursor() {
    let mut rt = runtime_with(json!({
        "next_id": 2,
        "new_name": "Ann",
        "new_email": "a@x",
        "dynamic_users": [{"id": 1, "name": "seed", "email": "s@x"}]
    }));
    rt.apply_and_deliver(
        "page",
        &[
            SchemaPatch::new(
                PatchOp::AppendToList,
                "state.params.dynamic_users",
                json!({
                    "id": "${state.params.next_id}",
                    "name": "${state.params.new_name}",
                    "email": "${state.params.new_email}"
                }),
            ),
            SchemaPatch::new(PatchOp::Increment, "state.params.next_id", json!(1)),
        ],
    )
    .unwrap();

    let users = params(&rt)["dynamic_users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    // Whole-placeholder expansion keeps the number a number.
    assert_eq!(users[1], json!({"id": 2, "name": "Ann", "email": "a@x"}));
    assert_eq!(params(&rt)["next_id"], json!(3));
}

#[test]
fn field_rename_migrates_the_params_entry() {
    let mut rt = Runtime::new("page");
    let schema: UiSchema = serde_json::from_value(json!({
        "page_key": "page",
        "state": {"params": {"a": "hello"}, "runtime": {}},
        "blocks": [{
            "id": "form",
            "props": {"fields": [{"type": "text", "key": "a", "label": "A"}]}
        }]
    }))
    .unwrap();
    rt.store.set("page", schema);

    rt.apply_and_deliver(
        "page",
        &[SchemaPatch::set("blocks.0.props.fields.0.key", json!("b"))],
    )
    .unwrap();

    let p = params(&rt);
    assert_eq!(p["b"], json!("hello"));
    assert!(!p.contains_key("a"));
}

#[test]
fn row_delete_by_parked_template() {
    let mut rt = runtime_with(json!({
        "employees": [
            {"id": 1, "name": "Ann"},
            {"id": 2, "name": "Bob"},
            {"id": 3, "name": "Cid"}
        ],
        "temp_rowData": {"id": 2, "name": "Bob"}
    }));
    rt.apply_and_deliver(
        "page",
        &[SchemaPatch::new(
            PatchOp::RemoveFromList,
            "state.params.employees",
            json!({"key": "id", "value": "${state.params.temp_rowData.id}"}),
        )],
    )
    .unwrap();

    let ids: Vec<i64> = params(&rt)["employees"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn filter_list_removes_the_matching_items() {
    let mut rt = runtime_with(json!({
        "todo": [
            {"id": 1, "done": true},
            {"id": 2, "done": false},
            {"id": 3, "done": true}
        ]
    }));
    rt.apply_and_deliver(
        "page",
        &[SchemaPatch::new(
            PatchOp::FilterList,
            "state.params.todo",
            json!({"key": "done", "operator": "==", "value": true}),
        )],
    )
    .unwrap();

    let ids: Vec<i64> = params(&rt)["todo"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![2]);
}

#[test]
fn filter_list_on_inequality_keeps_the_complement() {
    let mut rt = runtime_with(json!({
        "todo": [
            {"id": 1, "done": true},
            {"id": 2, "done": false},
            {"id": 3, "done": true}
        ]
    }));
    rt.apply_and_deliver(
        "page",
        &[SchemaPatch::new(
            PatchOp::FilterList,
            "state.params.todo",
            json!({"key": "done", "operator": "!=", "value": true}),
        )],
    )
    .unwrap();

    let ids: Vec<i64> = params(&rt)["todo"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn addressing_failures_skip_without_aborting_the_batch() {
    let mut rt = runtime_with(json!({"a": 1}));
    let report = rt
        .apply_and_deliver(
            "page",
            &[
                SchemaPatch::set("blocks.7.title", json!("nope")),
                SchemaPatch::set("state.params.a", json!(2)),
            ],
        )
        .unwrap();
    assert_eq!(report.patches_applied(), 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(params(&rt)["a"], json!(2));
    // Only the applied patch enters history.
    assert_eq!(rt.history.count("page"), 1);
}

#[test]
fn direct_engine_laws_hold_on_params() {
    let mut s: UiSchema = serde_json::from_value(json!({
        "page_key": "p",
        "state": {"params": {"n": 7, "on": true, "xs": [{"k": "a"}]}, "runtime": {}}
    }))
    .unwrap();

    // increment then decrement is identity.
    apply_batch(
        &mut s,
        &[
            SchemaPatch::new(PatchOp::Increment, "state.params.n", json!(1)),
            SchemaPatch::new(PatchOp::Decrement, "state.params.n", json!(1)),
        ],
    );
    assert_eq!(s.state.params["n"], json!(7));

    // double toggle is identity.
    apply_batch(
        &mut s,
        &[
            SchemaPatch::new(PatchOp::Toggle, "state.params.on", Value::Null),
            SchemaPatch::new(PatchOp::Toggle, "state.params.on", Value::Null),
        ],
    );
    assert_eq!(s.state.params["on"], json!(true));

    // append then remove of the same key is identity.
    apply_batch(
        &mut s,
        &[
            SchemaPatch::new(
                PatchOp::AppendToList,
                "state.params.xs",
                json!({"k": "b"}),
            ),
            SchemaPatch::new(
                PatchOp::RemoveFromList,
                "state.params.xs",
                json!({"key": "k", "value": "b"}),
            ),
        ],
    );
    assert_eq!(s.state.params["xs"], json!([{"k": "a"}]));

    // filter with a predicate matching nothing is identity.
    apply_batch(
        &mut s,
        &[SchemaPatch::new(
            PatchOp::FilterList,
            "state.params.xs",
            json!({"key": "k", "operator": "==", "value": "zzz"}),
        )],
    );
    assert_eq!(s.state.params["xs"], json!([{"k": "a"}]));

    // filter with a predicate matching everything clears the list.
    apply_batch(
        &mut s,
        &[SchemaPatch::new(
            PatchOp::FilterList,
            "state.params.xs",
            json!({"key": "k", "operator": "==", "value": "a"}),
        )],
    );
    assert_eq!(s.state.params["xs"], json!([]));
}
