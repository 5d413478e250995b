use serde_json::{Value, json};
use tokio::io::BufReader;

use form_autofill::bridge::handler::{PageBridge, spawn_bridge};
use form_autofill::bridge::host::serve_lines;
use form_autofill::bridge::message::{BridgeError, BridgeMessage, BridgeResponse};
use form_autofill::dom::events::EventKind;
use form_autofill::mapper::mapping_model::FieldMapping;

mod common;

use common::pages::{application_form, full_name_page, node};

#[test]
fn scan_message_returns_elements_and_fingerprint() {
    let mut bridge = PageBridge::new(application_form());
    let response = bridge.handle(&json!({"type": "SCAN_PAGE"}));

    assert!(response.success);
    assert_eq!(response.elements.as_ref().map(Vec::len), Some(5));
    assert!(response.fingerprint.is_some());
    assert_eq!(response.error, None);
}

#[test]
fn fill_message_returns_counts() {
    let mut bridge = PageBridge::new(full_name_page());
    let response = bridge.handle(&json!({
        "type": "FILL_PAGE",
        "payload": {"mapping": [
            {"selector": "#name", "value": "Jane Doe", "confidence": 0.95},
            {"selector": "#missing", "value": "x"}
        ]}
    }));

    assert!(response.success);
    assert_eq!(response.filled, Some(1));
    assert_eq!(response.total, Some(2));
    assert_eq!(response.errors.as_ref().map(Vec::len), Some(1));

    let page = bridge.page();
    let name = node(page, "#name");
    assert_eq!(page.value(name), Some("Jane Doe"));
    assert_eq!(
        page.events_for(name),
        vec![EventKind::Input, EventKind::Change, EventKind::Blur]
    );
}

#[test]
fn low_confidence_fill_mapping_is_not_applied() {
    let mut bridge = PageBridge::new(full_name_page());
    let response = bridge.handle(&json!({
        "type": "FILL_PAGE",
        "payload": {"mapping": [
            {"selector": "#name", "value": "Guess", "confidence": 0.1}
        ]}
    }));

    assert!(response.success);
    assert_eq!(response.filled, Some(0));
    assert_eq!(response.total, Some(0));

    let page = bridge.page();
    let name = node(page, "#name");
    assert_ne!(page.value(name), Some("Guess"));
    assert!(page.events_for(name).is_empty());
}

#[test]
fn unknown_type_is_an_explicit_error() {
    let mut bridge = PageBridge::new(full_name_page());

    let response = bridge.handle(&json!({"type": "SUBMIT_PAGE"}));
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Unknown message type: SUBMIT_PAGE"));

    let response = bridge.handle(&json!({"payload": {}}));
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Unknown message type: <missing>"));
}

#[test]
fn malformed_fill_payload_is_rejected_without_touching_the_page() {
    let mut bridge = PageBridge::new(full_name_page());
    let response = bridge.handle(&json!({"type": "FILL_PAGE", "payload": {"mapping": "nope"}}));

    assert!(!response.success);
    assert!(response.error.unwrap().starts_with("Invalid message payload"));
    assert!(bridge.page().events().is_empty());
}

#[test]
fn request_id_is_echoed() {
    let mut bridge = PageBridge::new(full_name_page());
    let response = bridge.handle(&json!({"type": "SCAN_PAGE", "id": 42}));
    assert_eq!(response.id, Some(json!(42)));
}

#[test]
fn responses_serialize_to_the_wire_shape() {
    let failure = BridgeResponse::failure(&BridgeError::UnknownType("X".into()));
    assert_eq!(
        serde_json::to_value(&failure).unwrap(),
        json!({"success": false, "error": "Unknown message type: X"})
    );

    let fill = BridgeMessage::fill(vec![FieldMapping::new("#name", "Jane", None)]).to_value();
    assert_eq!(
        fill,
        json!({"type": "FILL_PAGE", "payload": {"mapping": [{"selector": "#name", "value": "Jane"}]}})
    );
    assert_eq!(BridgeMessage::ScanPage.to_value(), json!({"type": "SCAN_PAGE"}));
}

#[test]
fn failed_response_converts_to_error() {
    let failure = BridgeResponse::failure(&BridgeError::UnknownType("X".into()));
    assert_eq!(
        failure.into_scan(),
        Err(BridgeError::Failed("Unknown message type: X".into()))
    );
}

// =========================================================================
// Spawned bridge
// =========================================================================

#[tokio::test]
async fn spawned_bridge_replies_asynchronously_and_returns_the_page() {
    let (handle, task) = spawn_bridge(full_name_page());

    let scan = handle.scan().await.unwrap();
    assert_eq!(scan.elements.len(), 1);
    assert_eq!(scan.elements[0].label.as_deref(), Some("Full Name"));

    let report = handle
        .fill(vec![FieldMapping::new("#name", "Jane Doe", Some(0.95))])
        .await
        .unwrap();
    assert_eq!((report.filled_count, report.total_count), (1, 1));

    let unknown = handle.send(json!({"type": "PING"})).await.unwrap();
    assert!(!unknown.success);

    drop(handle);
    let page = task.await.unwrap();
    assert_eq!(page.value(node(&page, "#name")), Some("Jane Doe"));
}

#[tokio::test]
async fn concurrent_callers_each_get_their_reply() {
    let (handle, task) = spawn_bridge(application_form());

    let mut joins = Vec::new();
    for i in 0..8 {
        let handle = handle.clone();
        joins.push(tokio::spawn(async move {
            handle.send(json!({"type": "SCAN_PAGE", "id": i})).await.unwrap()
        }));
    }

    for (i, join) in joins.into_iter().enumerate() {
        let response = join.await.unwrap();
        assert!(response.success);
        assert_eq!(response.id, Some(json!(i)));
    }

    drop(handle);
    task.await.unwrap();
}

#[tokio::test]
async fn closed_bridge_reports_closed() {
    let (handle, task) = spawn_bridge(full_name_page());
    task.abort();
    let _ = task.await;

    assert_eq!(handle.scan().await, Err(BridgeError::Closed));
}

// =========================================================================
// Newline-delimited JSON host
// =========================================================================

#[tokio::test]
async fn line_host_answers_one_line_per_message() {
    let (handle, task) = spawn_bridge(full_name_page());

    let input = concat!(
        "{\"type\":\"SCAN_PAGE\",\"id\":1}\n",
        "\n",
        "not json\n",
        "{\"type\":\"FILL_PAGE\",\"id\":2,\"payload\":{\"mapping\":[{\"selector\":\"#name\",\"value\":\"Jane Doe\"}]}}\n",
        "{\"type\":\"NOPE\"}\n",
    );
    let mut output = Vec::new();

    let handled = serve_lines(&handle, BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();
    assert_eq!(handled, 4);

    let replies: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(replies.len(), 4);
    assert_eq!(replies[0]["success"], true);
    assert_eq!(replies[0]["id"], 1);
    assert!(replies[0]["elements"].is_array());

    assert_eq!(replies[1]["success"], false);
    assert!(replies[1]["error"].as_str().unwrap().starts_with("Invalid JSON message"));

    assert_eq!(replies[2]["filled"], 1);
    assert_eq!(replies[2]["total"], 1);

    assert_eq!(replies[3]["error"], "Unknown message type: NOPE");

    drop(handle);
    let page = task.await.unwrap();
    assert_eq!(page.value(node(&page, "#name")), Some("Jane Doe"));
}
