/*
    Transaction scenarios driven through a running node

    Requests are written to the node's input as JSON lines and replies are
    read from its outbox, exactly as a client would see them. Replication
    is disabled so the store only changes through the requests below.
*/

mod common;

use common::{init, reply_to, txn, TestNode};
use serde_json::json;
use snapkv_core::protocol::{ErrorCode, Message, Payload};
use snapkv_core::txn::{OpKind, Operation};
use snapkv_core::{Config, LogicalTimestamp};
use tokio::sync::mpsc::UnboundedReceiver;

fn single_node() -> (TestNode, UnboundedReceiver<Message>) {
    let mut config = Config::default();
    config.replication.enabled = false;
    TestNode::spawn("n1", &config)
}

async fn run_txn(
    node: &TestNode,
    outbox: &mut UnboundedReceiver<Message>,
    msg_id: u64,
    ops: serde_json::Value,
) -> Vec<Operation> {
    node.send(txn("c1", "n1", msg_id, ops)).await;
    match reply_to(outbox, msg_id).await.body.payload {
        Payload::TxnOk { txn } => txn,
        other => panic!("expected txn_ok, got {:?}", other),
    }
}

/// Scenario: a write at ts=1 is visible to a read at ts=2
#[tokio::test]
async fn test_write_then_read() {
    let (node, mut outbox) = single_node();
    node.send(init("c0", "n1", 100, &["n1"])).await;
    reply_to(&mut outbox, 100).await;

    let written = run_txn(&node, &mut outbox, 1, json!([["w", 5, 100]])).await;
    assert_eq!(written, vec![Operation::write(5, 100)]);

    let read = run_txn(&node, &mut outbox, 2, json!([["r", 5, null]])).await;
    let expected = Operation {
        kind: OpKind::Read,
        key: 5,
        value: Some(100),
    };
    assert_eq!(read, vec![expected]);

    node.stop().await.unwrap();
}

/// Scenario: a key that was never written reads back as null
#[tokio::test]
async fn test_read_of_absent_key() {
    let (node, mut outbox) = single_node();

    let read = run_txn(&node, &mut outbox, 1, json!([["r", 9, null]])).await;
    assert_eq!(read, vec![Operation::read(9)]);

    let (_, ts) = node.store().latest_snapshot().unwrap();
    assert_eq!(ts, LogicalTimestamp(1));

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_reads_see_earlier_writes_in_same_txn() {
    let (node, mut outbox) = single_node();

    let result = run_txn(
        &node,
        &mut outbox,
        3,
        json!([["r", 1, null], ["w", 1, 6], ["r", 1, null], ["w", 1, 7]]),
    )
    .await;
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!([["r", 1, null], ["w", 1, 6], ["r", 1, 6], ["w", 1, 7]])
    );

    let (latest, _) = node.store().latest_snapshot().unwrap();
    assert_eq!(latest.get(1), Some(7));

    node.stop().await.unwrap();
}

/// Scenario: a peer snapshot at ts=50 replaces local state at ts=10
#[tokio::test]
async fn test_newer_sync_overrides_local_writes() {
    let (node, mut outbox) = single_node();

    run_txn(&node, &mut outbox, 10, json!([["w", 1, 1], ["w", 3, 0]])).await;

    node.send(json!({
        "src": "n2",
        "dest": "n1",
        "body": {"type": "sync", "ts": 50, "state": {"3": 7}}
    }))
    .await;

    let store = node.store().clone();
    assert!(
        common::eventually(|| {
            store
                .latest_snapshot()
                .map(|(_, ts)| ts == LogicalTimestamp(50))
                .unwrap_or(false)
        })
        .await
    );

    let (latest, _) = store.latest_snapshot().unwrap();
    assert_eq!(latest.get(3), Some(7));
    assert_eq!(latest.get(1), None);

    let read = run_txn(&node, &mut outbox, 51, json!([["r", 3, null], ["r", 1, null]])).await;
    assert_eq!(
        serde_json::to_value(&read).unwrap(),
        json!([["r", 3, 7], ["r", 1, null]])
    );

    node.stop().await.unwrap();
}

/// Serial transactions are each visible as the latest snapshot in order
#[tokio::test]
async fn test_serial_writes_are_visible_in_order() {
    let (node, mut outbox) = single_node();

    for msg_id in 1..=20u64 {
        let key = (msg_id % 3) as i64;
        let value = msg_id as i64 * 10;
        run_txn(&node, &mut outbox, msg_id, json!([["w", key, value]])).await;

        let (latest, ts) = node.store().latest_snapshot().unwrap();
        assert_eq!(ts, LogicalTimestamp(msg_id));
        assert_eq!(latest.get(key), Some(value));
    }

    let ops = json!([["r", 0, null], ["r", 1, null], ["r", 2, null]]);
    let read = run_txn(&node, &mut outbox, 21, ops).await;
    assert_eq!(
        serde_json::to_value(&read).unwrap(),
        json!([["r", 0, 180], ["r", 1, 190], ["r", 2, 200]])
    );

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_malformed_requests_get_error_replies() {
    let (node, mut outbox) = single_node();

    node.send(txn("c1", "n1", 4, json!([["x", 1, null]]))).await;
    match reply_to(&mut outbox, 4).await.body.payload {
        Payload::Error { code, .. } => assert_eq!(code, ErrorCode::MalformedRequest),
        other => panic!("expected error, got {:?}", other),
    }

    node.send(json!({"src": "c1", "dest": "n1", "body": {"type": "echo", "msg_id": 5}}))
        .await;
    match reply_to(&mut outbox, 5).await.body.payload {
        Payload::Error { code, .. } => assert_eq!(code, ErrorCode::NotSupported),
        other => panic!("expected error, got {:?}", other),
    }

    // Neither request touched the store
    assert_eq!(node.store().stats().unwrap().versions, 1);

    // The node keeps serving after bad input
    let read = run_txn(&node, &mut outbox, 6, json!([["r", 1, null]])).await;
    assert_eq!(read, vec![Operation::read(1)]);

    node.stop().await.unwrap();
}
